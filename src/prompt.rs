//! Line prompting with optional echo suppression, for login/sudo/passwd
//! password entry. Grounded on the teacher's `utils/src/prompt.rs`, which
//! toggles `ICANON`/`ECHO`/`ECHOE` via `libc::tcgetattr`/`tcsetattr` around a
//! single line read; kept as the corpus-idiomatic way to do this rather than
//! pulling in a terminal crate such as `rpassword`, which appears nowhere in
//! this retrieval pack.

use libc::{tcgetattr, tcsetattr, termios, ECHO, ECHOE, ICANON, STDIN_FILENO, TCSANOW, VMIN};
use std::io::{self, BufRead, Write};
use std::mem::MaybeUninit;

/// Reads one line from stdin after printing `prompt`. When `hidden` is set,
/// local echo is disabled for the duration of the read, matching a password
/// prompt; the terminal is always restored to its prior state afterward,
/// even if the read fails.
pub fn prompt(prompt_text: &str, hidden: bool) -> Option<String> {
    let saved = unsafe {
        let mut t: termios = MaybeUninit::zeroed().assume_init();
        tcgetattr(STDIN_FILENO, &mut t);
        t
    };

    if hidden {
        let mut raw = saved;
        raw.c_lflag &= !(ICANON | ECHO | ECHOE);
        raw.c_cc[VMIN as usize] = 1;
        unsafe {
            tcsetattr(STDIN_FILENO, TCSANOW, &raw);
        }
    }

    print!("{prompt_text}");
    let _ = io::stdout().flush();
    let line = io::stdin().lock().lines().next().and_then(Result::ok);

    if hidden {
        println!();
        unsafe {
            tcsetattr(STDIN_FILENO, TCSANOW, &saved);
        }
    }

    line
}
