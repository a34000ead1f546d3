//! Emisión de código para la máquina virtual de pila.
//!
//! [`Writer`] traduce segmentos y comandos abstractos a sus mnemónicos
//! canónicos y escribe una instrucción por línea, en el mismo orden en
//! que se solicitan. No hay buffering intermedio, reordenamiento ni
//! deduplicación de instrucciones.

use std::{
    fmt::{self, Display},
    io::{self, Write},
};

/// Rutinas de la biblioteca estándar que el código generado invoca por
/// nombre. Se asume que existen; este compilador nunca las implementa.
pub mod runtime {
    /// Reserva `n` palabras y retorna una referencia.
    pub const ALLOC: &str = "Memory.alloc";

    /// Construye un texto vacío con la capacidad dada.
    pub const STRING_NEW: &str = "String.new";

    /// Agrega un carácter a un texto y retorna el mismo texto.
    pub const APPEND_CHAR: &str = "String.appendChar";

    pub const MULTIPLY: &str = "Math.multiply";

    pub const DIVIDE: &str = "Math.divide";
}

/// Región de almacenamiento direccionada por índice.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

impl Display for Segment {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Segment::*;

        let string = match self {
            Constant => "constant",
            Argument => "argument",
            Local => "local",
            Static => "static",
            This => "this",
            That => "that",
            Pointer => "pointer",
            Temp => "temp",
        };

        fmt.write_str(string)
    }
}

/// Comando aritmético o lógico sobre el tope de la pila.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl Display for Command {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Command::*;

        let string = match self {
            Add => "add",
            Sub => "sub",
            Neg => "neg",
            Eq => "eq",
            Gt => "gt",
            Lt => "lt",
            And => "and",
            Or => "or",
            Not => "not",
        };

        fmt.write_str(string)
    }
}

/// Escritor de instrucciones sobre un sink de salida.
pub struct Writer<W: Write> {
    output: W,
}

impl<W: Write> Writer<W> {
    pub fn new(output: W) -> Self {
        Writer { output }
    }

    pub fn push(&mut self, segment: Segment, index: u16) -> io::Result<()> {
        emit!(self, "push", segment, index)
    }

    pub fn pop(&mut self, segment: Segment, index: u16) -> io::Result<()> {
        emit!(self, "pop", segment, index)
    }

    pub fn arithmetic(&mut self, command: Command) -> io::Result<()> {
        emit!(self, command.to_string())
    }

    pub fn label(&mut self, label: &str) -> io::Result<()> {
        emit!(self, "label", label)
    }

    pub fn goto(&mut self, label: &str) -> io::Result<()> {
        emit!(self, "goto", label)
    }

    pub fn if_goto(&mut self, label: &str) -> io::Result<()> {
        emit!(self, "if-goto", label)
    }

    /// Invoca a una función que ya tiene sus argumentos en la pila.
    pub fn call(&mut self, function: &str, arguments: u16) -> io::Result<()> {
        emit!(self, "call", function, arguments)
    }

    /// Inicia una función con la cantidad dada de locales.
    pub fn function(&mut self, function: &str, locals: u16) -> io::Result<()> {
        emit!(self, "function", function, locals)
    }

    pub fn ret(&mut self) -> io::Result<()> {
        emit!(self, "return")
    }

    /// Vacía y libera el sink, que se retorna al llamador.
    ///
    /// Al consumir `self`, ninguna instrucción puede escribirse después.
    pub fn close(mut self) -> io::Result<W> {
        self.output.flush()?;
        Ok(self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render<F>(write: F) -> String
    where
        F: FnOnce(&mut Writer<Vec<u8>>) -> io::Result<()>,
    {
        let mut writer = Writer::new(Vec::new());
        write(&mut writer).unwrap();
        String::from_utf8(writer.close().unwrap()).unwrap()
    }

    #[test]
    fn operands_are_omitted_when_not_applicable() {
        let output = render(|w| {
            w.push(Segment::Constant, 7)?;
            w.pop(Segment::Pointer, 1)?;
            w.arithmetic(Command::Not)?;
            w.label("WHILE_TOP0")?;
            w.goto("WHILE_TOP0")?;
            w.if_goto("WHILE_END0")?;
            w.call(runtime::MULTIPLY, 2)?;
            w.function("Main.main", 3)?;
            w.ret()
        });

        assert_eq!(
            output,
            "push constant 7\n\
             pop pointer 1\n\
             not\n\
             label WHILE_TOP0\n\
             goto WHILE_TOP0\n\
             if-goto WHILE_END0\n\
             call Math.multiply 2\n\
             function Main.main 3\n\
             return\n"
        );
    }

    #[test]
    fn segments_use_canonical_mnemonics() {
        use Segment::*;

        let names: Vec<_> = [Constant, Argument, Local, Static, This, That, Pointer, Temp]
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            names,
            ["constant", "argument", "local", "static", "this", "that", "pointer", "temp"]
        );
    }
}
