//! Punto de entrada ("driver").
//!
//! Este módulo descubre las unidades de código fuente a compilar,
//! asocia cada una con su archivo de salida y expone una CLI. Cada
//! unidad se compila de forma independiente de las demás.

use anyhow::{anyhow, bail, Context};
use clap::{self, crate_version, Arg};
use jackc::{
    error::Diagnostics,
    lex::Lexer,
    source::Source,
};

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

/// Extensión de las unidades de código fuente.
const SOURCE_EXTENSION: &str = "jack";

/// Extensión de los archivos de salida.
const OUTPUT_EXTENSION: &str = "vm";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Parsing de CLI
    let args = clap::Command::new("Jack compiler")
        .version(crate_version!())
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .required(true)
                .multiple_values(true)
                .help("Source files or directories containing .jack files"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .help("Output file for a single source unit ('-' for stdout)"),
        )
        .arg(
            Arg::new("tokens")
                .short('T')
                .long("tokens")
                .help("Print the token stream instead of compiling"),
        )
        .get_matches();

    let mut units = Vec::new();
    for input in args.values_of("input").into_iter().flatten() {
        discover(Path::new(input), &mut units)?;
    }

    if units.is_empty() {
        bail!("No .{} files found", SOURCE_EXTENSION);
    }

    let output = args.value_of("output");
    if output.is_some() && units.len() > 1 {
        bail!("Refusing to write {} source units to a single output", units.len());
    }

    for unit in &units {
        let text = fs::read_to_string(unit)
            .with_context(|| format!("Failed to read source: {}", unit.display()))?;

        let name = unit.display().to_string();
        if args.is_present("tokens") {
            dump_tokens(&name, &text)?;
            continue;
        }

        let code = jackc::compile(&name, &text, Vec::new()).map_err(|error| {
            eprint!("{}", Diagnostics::from(error));
            anyhow!("Failed to compile {}", name)
        })?;

        match output {
            // Salida a stdout
            Some("-") => io::stdout()
                .write_all(&code)
                .context("Failed to emit to stdout")?,

            // Salida a un archivo explícito o al archivo hermano `.vm`
            path => {
                let path = path.map_or_else(|| unit.with_extension(OUTPUT_EXTENSION), PathBuf::from);
                fs::write(&path, &code)
                    .with_context(|| format!("Failed to write output: {}", path.display()))?;

                log::info!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}

/// Agrega las unidades que corresponden a una ruta de entrada.
///
/// Un directorio aporta sus archivos `.jack` (sin recursión), en orden
/// alfabético para que la salida sea determinista.
fn discover(input: &Path, units: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    if input.is_dir() {
        let entries = fs::read_dir(input)
            .with_context(|| format!("Failed to list directory: {}", input.display()))?;

        let mut found = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to list directory: {}", input.display()))?
                .path();

            if path.is_file() && has_source_extension(&path) {
                found.push(path);
            }
        }

        found.sort();
        units.extend(found);
    } else if has_source_extension(input) {
        units.push(input.to_path_buf());
    } else {
        bail!(
            "Expected a .{} file or a directory: {}",
            SOURCE_EXTENSION,
            input.display()
        );
    }

    Ok(())
}

fn has_source_extension(path: &Path) -> bool {
    path.extension().map_or(false, |extension| extension == SOURCE_EXTENSION)
}

fn dump_tokens(name: &str, text: &str) -> anyhow::Result<()> {
    let source = Source::new(name, text);
    let tokens = Lexer::new(&source).tokenize().map_err(|error| {
        eprint!("{}", Diagnostics::from(error).kind("Lexical error"));
        anyhow!("Failed to tokenize {}", name)
    })?;

    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    for token in tokens.tokens() {
        writeln!(stdout, "{}", token).context("Failed to emit to stdout")?;
    }

    Ok(())
}
