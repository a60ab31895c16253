//! `filemgrd`: the thin REPL front-end over the `fscore` library (see
//! SPEC_FULL.md §4.11). Opens or creates the disk image named on the command
//! line (default `./disk.dsk`, spec.md §6 "Environment"), mounts it, logs in,
//! then dispatches one line at a time to the core.

mod cli;
mod prompt;

use fscore::Volume;
use std::env;
use std::path::{Path, PathBuf};
use std::process::exit;

const DEFAULT_IMAGE_PATH: &str = "./disk.dsk";
const DEFAULT_CAPACITY: u32 = 8 * 1024 * 1024;
const DEFAULT_BLOCK_SIZE: u16 = fscore::consts::DEFAULT_BLOCK_SIZE;

const USAGE: &str = "\
usage: filemgrd [-h|--help] [--size <bytes>] [<image path>]

Opens or creates a disk image and runs the interactive shell over it.
If the image does not exist yet, it is created with --size bytes
(default 8388608) and formatted immediately.";

fn error(bin: &str, msg: impl std::fmt::Display) -> ! {
    eprintln!("{bin}: {msg}");
    exit(1);
}

struct Args {
    image_path: PathBuf,
    capacity: u32,
}

fn parse_args() -> Args {
    let mut image_path = None;
    let mut capacity = DEFAULT_CAPACITY;
    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("{USAGE}");
                exit(0);
            }
            "--size" => {
                let value = it.next().unwrap_or_else(|| error("filemgrd", "--size requires a value"));
                capacity = value.parse().unwrap_or_else(|_| error("filemgrd", "--size must be a number"));
            }
            other if image_path.is_none() => image_path = Some(PathBuf::from(other)),
            other => error("filemgrd", format!("unexpected argument: {other}")),
        }
    }
    Args {
        image_path: image_path.unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_PATH)),
        capacity,
    }
}

fn open_or_create(path: &Path, capacity: u32) -> Volume {
    if !path.exists() {
        println!("{}: creating a fresh {} byte image", path.display(), capacity);
        Volume::create_image(path, capacity).unwrap_or_else(|e| error("filemgrd", e));
        return Volume::format_existing(path, DEFAULT_BLOCK_SIZE).unwrap_or_else(|e| error("filemgrd", e));
    }
    Volume::mount(path).unwrap_or_else(|e| {
        error(
            "filemgrd",
            format!("{e} (run against a new path, or delete this image, to start over)"),
        )
    })
}

fn main() {
    let args = parse_args();
    let mut vol = open_or_create(&args.image_path, args.capacity);
    let root = vol.root_location();
    cli::login_and_run(&mut vol, root);
}
