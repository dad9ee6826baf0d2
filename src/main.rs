use std::io;
use std::{env, process};

use lox::Lox;

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut lox = Lox::new(Box::new(io::stdout()));

    let code = match args.len() {
        n if n > 2 => {
            println!("Usage: lox [script]");
            64
        }
        2 => lox.run_file(&args[1]),
        _ => lox.run_prompt(),
    };

    process::exit(code);
}
