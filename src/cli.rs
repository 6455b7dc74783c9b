use crate::error::{ConvertError, ErrorKind};
use crate::ConvertOptions;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sb3toc",
    about = "Convert a Scratch 3 project (.sb3 or project.json) into Arduino-style C source."
)]
pub struct Args {
    #[arg(value_name = "INPUT", help = "Input .sb3 or project.json (standard input if omitted).")]
    pub input: Option<PathBuf>,

    #[arg(short, long, value_name = "OUTPUT", help = "Output file (standard output if omitted).")]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "NAME", help = "Convert only the target with this name.")]
    pub target: Option<String>,

    #[arg(long, value_name = "HEADER", default_value = "scratch.h", help = "Runtime header to include.")]
    pub header: String,

    #[arg(long, value_name = "N", default_value_t = 256, help = "Maximum block nesting depth.")]
    pub max_depth: usize,

    #[arg(long, value_name = "N", default_value_t = 100_000, help = "Maximum number of blocks per target.")]
    pub max_blocks: usize,

    #[arg(long, help = "Do not emit variable and list declarations.")]
    pub no_declarations: bool,

    #[arg(short, long, help = "Log pipeline details to stderr.")]
    pub verbose: bool,

    #[arg(short, long, help = "Suppress progress output.")]
    pub quiet: bool,

    #[arg(long, help = "Print the exit code table and exit.")]
    pub exit_codes: bool,
}

impl Args {
    pub fn options(&self) -> ConvertOptions {
        ConvertOptions {
            runtime_header: self.header.clone(),
            max_blocks: self.max_blocks,
            max_depth: self.max_depth,
            emit_declarations: !self.no_declarations,
        }
    }
}

pub const EXIT_UNKNOWN: u8 = 1;
pub const EXIT_IO: u8 = 2;

pub fn kind_exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::MalformedInput => 3,
        ErrorKind::UnimplementedOpcode => 4,
        ErrorKind::NoTopLevel => 5,
        ErrorKind::TooManyTopLevel => 6,
        ErrorKind::ReferentialIntegrity => 7,
        ErrorKind::StructuralViolation => 8,
        ErrorKind::LimitExceeded => 9,
    }
}

/// Maps the first recognised error in the chain onto a process exit code.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(convert) = cause.downcast_ref::<ConvertError>() {
            return kind_exit_code(convert.kind());
        }
        if cause.downcast_ref::<zip::result::ZipError>().is_some() {
            return kind_exit_code(ErrorKind::MalformedInput);
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return EXIT_IO;
        }
    }
    EXIT_UNKNOWN
}

pub fn exit_code_table() -> String {
    let mut table = String::new();
    table.push_str("0\tSuccess\n");
    table.push_str(&format!("{}\tUnknown error\n", EXIT_UNKNOWN));
    table.push_str(&format!("{}\tI/O error\n", EXIT_IO));
    for kind in ErrorKind::ALL {
        table.push_str(&format!("{}\t{}\n", kind_exit_code(kind), kind.describe()));
    }
    table
}
