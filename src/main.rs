//! PE Description Compiler CLI
//!
//! Usage:
//!   pedslc pe.dsl
//!   pedslc -e "a = Input(BitVector(8)); out = Output(BitVector(8)); out.assign(a);"
//!   pedslc pe.dsl --decode-spec decode.json --check
//!   pedslc pe.dsl --json

use clap::Parser as ClapParser;
use colored::Colorize;
use std::fs;
use std::io::{self, Read};

use pe_dsl::{compile, DecodeSpec, Ir, TypeTable};

#[derive(ClapParser, Debug)]
#[command(name = "pedslc")]
#[command(version = "0.1.0")]
#[command(about = "Compiles processing-element descriptions")]
struct Args {
    /// Description file to compile; reads stdin when omitted
    #[arg(value_name = "FILE")]
    input_file: Option<String>,

    /// Compile an inline description instead of a file
    #[arg(short = 'e', long = "expr", value_name = "SOURCE")]
    inline: Option<String>,

    /// Verify a decode specification (JSON) against the description
    #[arg(long = "decode-spec", value_name = "SPEC")]
    decode_spec: Option<String>,

    /// Stop after checking; print nothing on success
    #[arg(short = 'c', long = "check")]
    check_only: bool,

    /// Print the interface summary as JSON
    #[arg(short = 'j', long = "json")]
    json_output: bool,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    // Get the description from argument, file, or stdin
    let (src_id, source) = if let Some(source) = args.inline.clone() {
        ("<inline>".to_string(), source)
    } else if let Some(file) = args.input_file.clone() {
        let text = fs::read_to_string(&file).unwrap_or_else(|e| {
            eprintln!("{}: Failed to read file '{}': {}", "Error".red(), file, e);
            std::process::exit(1);
        });
        (file, text)
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).unwrap_or_else(|e| {
            eprintln!("{}: Failed to read stdin: {}", "Error".red(), e);
            std::process::exit(1);
        });
        ("<stdin>".to_string(), buffer)
    };

    if args.verbose {
        println!("{}", "PE Description Compiler".bold().blue());
        println!("{}", "=".repeat(30));
        println!();
        println!("{}: {}", "Source".green(), src_id);
        println!();
    }

    let (ir, types) = match compile(&src_id, &source) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}: {}", "Compile error".red(), e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &args.decode_spec {
        let text = fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("{}: Failed to read file '{}': {}", "Error".red(), path, e);
            std::process::exit(1);
        });
        let spec: DecodeSpec = match serde_json::from_str(&text) {
            Ok(spec) => spec,
            Err(e) => {
                eprintln!("{}: '{}' is not a decode specification: {}", "Error".red(), path, e);
                std::process::exit(1);
            }
        };
        if let Err(e) = pe_dsl::decode::verify(&spec, &ir) {
            eprintln!("{}: {}", "Decode error".red(), e);
            std::process::exit(1);
        }
        if args.verbose {
            println!("{}: decode specification covers the description", "OK".green());
        }
    }

    if args.check_only {
        return;
    }

    if args.json_output {
        match serde_json::to_string_pretty(&ir.interface()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{}: Failed to serialize to JSON: {}", "Error".red(), e);
                std::process::exit(1);
            }
        }
    } else {
        print_interface(&ir, &types, args.verbose);
    }
}

fn print_interface(ir: &Ir, types: &TypeTable, verbose: bool) {
    println!("{}", "Compilation Results".bold().green());
    println!("{}", "=".repeat(50));
    println!();

    if !ir.enums.is_empty() {
        println!("{}", "Enums".bold().yellow());
        for (name, members) in &ir.enums {
            println!("  {} {{ {} }}", name.cyan(), members.join(", "));
        }
        println!();
    }

    for (title, section) in [
        ("Inputs", &ir.inputs),
        ("Outputs", &ir.outputs),
        ("Intermediates", &ir.intermediates),
    ] {
        if section.is_empty() {
            continue;
        }
        println!("{}", title.bold().yellow());
        for (name, ty) in section {
            println!("  {}: {}", name.cyan(), ty);
        }
        println!();
    }

    println!("{}: {}", "Statements".cyan(), ir.body.len());
    if verbose {
        println!("{}: {}", "Expression nodes".cyan(), ir.expr_count());
        println!("{}: {}", "Typed nodes".cyan(), types.len());
    }
}
