//! Compilador de un lenguaje de clases hacia una máquina virtual de pila.
//!
//! # Pipeline
//! Cada unidad de código fuente contiene exactamente una clase y se
//! compila de forma independiente, en una sola pasada. El texto se somete
//! primero a análisis léxico en [`lex`], de lo cual se obtiene un flujo
//! de tokens completo. Luego el motor de descenso recursivo en [`parse`]
//! recorre ese flujo y, sin construir un árbol sintáctico, emite
//! instrucciones de máquina virtual por medio de [`codegen`] mientras
//! resuelve identificadores con la tabla de [`symbols`].
//!
//! # Rutinas externas
//! El código generado invoca por nombre rutinas de la biblioteca estándar
//! del lenguaje (reserva de memoria, construcción de textos, multiplicación
//! y división). Estas rutinas se asumen existentes y no forman parte de
//! este compilador; ver [`codegen::runtime`].
//!
//! # Errores
//! Todo error es fatal para la unidad actual. Ver [`error`] para la
//! presentación de diagnósticos.

#[macro_use]
mod macros;

pub mod codegen;
pub mod error;
pub mod lex;
pub mod parse;
pub mod source;
pub mod symbols;

use std::io::Write;

use error::CompileError;
use lex::Lexer;
use source::Source;

/// Compila una unidad de código fuente completa hacia `output`.
///
/// `name` identifica la unidad en diagnósticos. En caso de éxito se
/// retorna el sink de salida; en caso de error, lo que se haya escrito
/// en él no debe considerarse válido.
pub fn compile<W: Write>(name: &str, text: &str, output: W) -> Result<W, CompileError> {
    let source = Source::new(name, text);
    let tokens = Lexer::new(&source).tokenize()?;

    Ok(parse::compile_class(tokens, output)?)
}
