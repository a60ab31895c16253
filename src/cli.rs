//! The REPL front-end (SPEC_FULL.md §4.11): parses one line into a command
//! and double-quote-aware arguments, dispatches to the core, and prints
//! either the result or a `"<command>: <message>"` error line — the same
//! format as the teacher's `utils::error` helper, reused here for per-command
//! errors instead of `process::exit`. Calls [`Volume::update`] once per
//! state-changing command, per spec.md §5.

use crate::prompt::prompt;
use fscore::inode::ChmodWho;
use fscore::session::{self, Session};
use fscore::users;
use fscore::{FsError, Volume};

/// Splits one input line into whitespace-separated tokens, with
/// double-quoted spans preserved verbatim (spec.md §6: "Double-quoted
/// arguments preserve spaces").
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut tok = String::new();
        if c == '"' {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '"' {
                    break;
                }
                tok.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                tok.push(ch);
                chars.next();
            }
        }
        tokens.push(tok);
    }
    tokens
}

fn print_error(command: &str, err: FsError) {
    println!("{command}: {err}");
}

/// Authenticates a username/password pair against the volume's user table,
/// retrying on failure, matching `original_source`'s login loop and the
/// teacher's own `login/src/main.rs` prompt-until-correct shape.
fn login_loop(vol: &mut Volume) -> u8 {
    loop {
        let Some(name) = prompt("login: ", false) else {
            std::process::exit(0);
        };
        let Some(password) = prompt("Password: ", true) else {
            std::process::exit(0);
        };
        match users::authenticate(vol.superblock(), &name, &password) {
            Ok(uid) => return uid,
            Err(_) => println!("Login incorrect"),
        }
    }
}

const HELP_TEXT: &str = "\
cat <path>
cd <path>
chmod <path> -a|-t|-o [r][w][x]
clear
cp <src> <dest>
distrust <user>
echo <text> [> <path> | >> <path>]
exit
format
help [<cmd>]
logout
ls [-l] [<path>]
lsuser
mkdir <path>
mkuser <name>
mv <src> <dest>
passwd
rm <path>
rmdir <path>
rmuser <name>
sudo <cmd>
touch <path>
trust <user>
vim <path>";

/// Reads whatever is piped to stdin until EOF, as the minimal line-based
/// substitute for the full-screen editor (out of scope, spec.md §1).
fn read_vim_stdin() -> Vec<u8> {
    use std::io::Read;
    let mut buf = Vec::new();
    let _ = io::stdin().lock().read_to_end(&mut buf);
    buf
}

use std::io;

/// Parses a `chmod` `who` flag (`-a`, `-t`, `-o`) into a [`ChmodWho`].
fn parse_who(flag: &str) -> Result<ChmodWho, FsError> {
    match flag {
        "-a" => Ok(ChmodWho::All),
        "-t" => Ok(ChmodWho::Trusted),
        "-o" => Ok(ChmodWho::Other),
        _ => Err(FsError::InvalidArgument("chmod target must be -a, -t, or -o")),
    }
}

/// Runs one command, already tokenized, against `vol`/`session`. Returns
/// `false` when the REPL loop (for this login session) should end, either
/// because of `exit` or `logout`.
fn dispatch(vol: &mut Volume, root: u32, session: &mut Session, tokens: &[String]) -> bool {
    let Some(cmd) = tokens.first().map(String::as_str) else {
        return true;
    };
    session.command_name = cmd.to_string();
    let args = &tokens[1..];

    let result: Result<(), FsError> = (|| {
        match cmd {
            "cat" => {
                let path = args.first().ok_or(FsError::InvalidArgument("cat: missing path"))?;
                let content = session::cat(vol, root, session, path)?;
                io::Write::write_all(&mut io::stdout(), &content).ok();
                Ok(())
            }
            "cd" => {
                let path = args.first().map(String::as_str).unwrap_or("/");
                session.cwd = session::cd(vol, root, session, path)?;
                Ok(())
            }
            "chmod" => {
                let path = args.first().ok_or(FsError::InvalidArgument("chmod: missing path"))?;
                let who = args.get(1).ok_or(FsError::InvalidArgument("chmod: missing who"))?;
                let perm_str = args.get(2).ok_or(FsError::InvalidArgument("chmod: missing permission string"))?;
                session::chmod(vol, root, session, path, parse_who(who)?, perm_str)
            }
            "clear" => {
                print!("\x1B[2J\x1B[H");
                Ok(())
            }
            "cp" => {
                let src = args.first().ok_or(FsError::InvalidArgument("cp: missing source"))?;
                let dest = args.get(1).ok_or(FsError::InvalidArgument("cp: missing destination"))?;
                session::cp(vol, root, session, src, dest)
            }
            "distrust" => {
                let name = args.first().ok_or(FsError::InvalidArgument("distrust: missing user"))?;
                session::distrust(vol, session, name)
            }
            "echo" => {
                let redirect_idx = args.iter().position(|a| a == ">" || a == ">>");
                match redirect_idx {
                    Some(idx) => {
                        let text = args[..idx].join(" ");
                        let append = args[idx] == ">>";
                        let path = args.get(idx + 1).ok_or(FsError::InvalidArgument("echo: missing path"))?;
                        session::write_file_content(vol, root, session, path, text.as_bytes(), append)
                    }
                    None => {
                        println!("{}", args.join(" "));
                        Ok(())
                    }
                }
            }
            "ls" => {
                let (long, path_args): (bool, Vec<&str>) = if args.first().map(String::as_str) == Some("-l") {
                    (true, args[1..].iter().map(String::as_str).collect())
                } else {
                    (false, args.iter().map(String::as_str).collect())
                };
                let path = path_args.first().copied().unwrap_or(".");
                if long {
                    for e in session::ls_long(vol, root, session, path)? {
                        let kind = if e.is_dir { 'd' } else { '-' };
                        println!(
                            "{kind}{} uid={} {} {}",
                            perm_str(e.trusted_bits, e.other_bits),
                            e.uid,
                            e.modified_time,
                            e.name
                        );
                    }
                } else {
                    println!("{}", session::ls(vol, root, session, path)?.join("\t"));
                }
                Ok(())
            }
            "lsuser" => {
                for name in users::lsuser(vol.superblock()) {
                    println!("{name}");
                }
                Ok(())
            }
            "mkdir" => {
                let path = args.first().ok_or(FsError::InvalidArgument("mkdir: missing path"))?;
                session::mkdir(vol, root, session, path)
            }
            "mkuser" => {
                let name = args.first().ok_or(FsError::InvalidArgument("mkuser: missing name"))?;
                let password = prompt("Password: ", true).unwrap_or_default();
                session::mkuser(vol, session, name, &password).map(|_| ())
            }
            "mv" => {
                let src = args.first().ok_or(FsError::InvalidArgument("mv: missing source"))?;
                let dest = args.get(1).ok_or(FsError::InvalidArgument("mv: missing destination"))?;
                session::mv(vol, root, session, src, dest)
            }
            "passwd" => {
                let old = prompt("Old password: ", true).unwrap_or_default();
                let new = prompt("New password: ", true).unwrap_or_default();
                session::passwd(vol, session, &old, &new)
            }
            "rm" => {
                let path = args.first().ok_or(FsError::InvalidArgument("rm: missing path"))?;
                session::rm(vol, root, session, path)
            }
            "rmdir" => {
                let path = args.first().ok_or(FsError::InvalidArgument("rmdir: missing path"))?;
                session::rmdir(vol, root, session, path)
            }
            "rmuser" => {
                let name = args.first().ok_or(FsError::InvalidArgument("rmuser: missing name"))?;
                session::rmuser(vol, session, name).map(|_| ())
            }
            "touch" => {
                let path = args.first().ok_or(FsError::InvalidArgument("touch: missing path"))?;
                session::touch(vol, root, session, path)
            }
            "trust" => {
                let name = args.first().ok_or(FsError::InvalidArgument("trust: missing user"))?;
                session::trust(vol, session, name)
            }
            "vim" => {
                let path = args.first().ok_or(FsError::InvalidArgument("vim: missing path"))?;
                let content = read_vim_stdin();
                session::write_file_content(vol, root, session, path, &content, false)
            }
            "format" => {
                session::format(vol, session, None).map(|_| ())
            }
            "sudo" => {
                if args.is_empty() {
                    return Err(FsError::InvalidArgument("sudo: missing command"));
                }
                let own_name = vol
                    .superblock()
                    .find_user_by_uid(session.uid)
                    .map(|slot| vol.superblock().users[slot].name_str())
                    .ok_or(FsError::NotFound)?;
                let password = prompt("Password: ", true).unwrap_or_default();
                users::authenticate(vol.superblock(), &own_name, &password)?;
                session.sudo = true;
                dispatch(vol, root, session, args);
                session.sudo = false;
                return Ok(());
            }
            "help" => {
                match args.first() {
                    Some(topic) => {
                        match HELP_TEXT.lines().find(|l| l.starts_with(topic.as_str())) {
                            Some(line) => println!("{line}"),
                            None => println!("help: no such command {topic}"),
                        }
                    }
                    None => println!("{HELP_TEXT}"),
                }
                Ok(())
            }
            _ => Err(FsError::InvalidArgument("invalid command")),
        }
    })();

    match (cmd, result) {
        ("exit", _) => return false,
        ("logout", _) => {
            session.reset_to_root(root);
            return false;
        }
        (_, Ok(())) => {}
        (_, Err(e)) => print_error(&session.command_name, e),
    }
    let _ = vol.update();
    true
}

fn perm_str(trusted: u8, other: u8) -> String {
    fn bits_to_str(b: u8) -> String {
        format!(
            "{}{}{}",
            if b & 0b100 != 0 { 'r' } else { '-' },
            if b & 0b010 != 0 { 'w' } else { '-' },
            if b & 0b001 != 0 { 'x' } else { '-' },
        )
    }
    format!("{}{}", bits_to_str(trusted), bits_to_str(other))
}

/// Runs the REPL for one logged-in session until `exit` or `logout`.
pub fn run_session(vol: &mut Volume, root: u32, uid: u8) {
    let mut session = Session::new(uid, root);
    loop {
        print!("$ ");
        let _ = io::Write::flush(&mut io::stdout());
        let mut line = String::new();
        if io::BufRead::read_line(&mut io::stdin().lock(), &mut line).unwrap_or(0) == 0 {
            break;
        }
        let tokens = tokenize(line.trim_end_matches('\n'));
        if tokens.is_empty() {
            continue;
        }
        if !dispatch(vol, root, &mut session, &tokens) {
            if tokens[0] == "exit" {
                break;
            }
            // logout: re-authenticate and keep looping.
            let uid = login_loop(vol);
            session = Session::new(uid, root);
        }
    }
}

pub fn login_and_run(vol: &mut Volume, root: u32) {
    let uid = login_loop(vol);
    run_session(vol, root, uid);
}
