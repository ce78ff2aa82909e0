use clap::{Parser as ClapParser, Subcommand};
use dawdle_lang::cli::{self, CheckOptions};

#[derive(ClapParser)]
#[command(name = "dawdle")]
#[command(about = "Dawdle - an indentation-sensitive relational-algebra language")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and execute a dawdle program
    Check {
        /// Program file (reads from stdin if not provided)
        file: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate syntax, don't execute
        #[arg(long)]
        syntax_only: bool,
    },

    /// Reformat a dawdle program
    Fmt {
        /// Program file (reads from stdin if not provided)
        file: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            file,
            pretty,
            syntax_only,
        } => cli::execute_check(CheckOptions {
            path: file.as_deref(),
            pretty,
            syntax_only,
        })
        .map(|result| {
            match result.output {
                Some(output) => println!("{}", output),
                None => println!("Syntax OK"),
            }
        }),
        Commands::Fmt { file } => cli::execute_fmt(file.as_deref()).map(|formatted| {
            print!("{}", formatted);
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
