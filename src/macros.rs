macro_rules! emit {
    ($writer:expr, $mnemonic:expr $(, $operand:expr)*) => {{
        let line = std::iter::once($mnemonic.to_string())
            $(.chain(std::iter::once($operand.to_string())))*
            .collect::<Vec<_>>()
            .join(" ");

        log::trace!("{}", line);
        writeln!($writer.output, "{}", line)
    }};
}
