//! Propiedades del compilador sobre entradas generadas.

use std::collections::HashSet;

use jackc::{
    lex::{Lexer, Token, INT_MAX},
    source::Source,
    symbols::{Kind, SymbolTable, Type},
};

use proptest::prelude::*;

fn compile(text: &str) -> Vec<String> {
    let output = jackc::compile("Test.jack", text, Vec::new()).expect("valid program");
    String::from_utf8(output)
        .expect("ASCII output")
        .lines()
        .map(String::from)
        .collect()
}

fn arb_kind() -> impl Strategy<Value = Kind> {
    prop_oneof![
        Just(Kind::Static),
        Just(Kind::Field),
        Just(Kind::Parameter),
        Just(Kind::Local),
    ]
}

/// Lexema de cualquier categoría de token.
fn arb_lexeme() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z_][a-zA-Z0-9_]{0,8}",
        (0..=INT_MAX).prop_map(|integer| integer.to_string()),
        "\"[a-zA-Z0-9 .,]{0,8}\"",
        prop::sample::select(&b"{}()[].,;+-*/&|<>=~"[..]).prop_map(|c| char::from(c).to_string()),
    ]
}

fn arb_separator() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![" ", "\n", "\t  ", " /* note */ ", "\n/** doc\n */", " // note\n"])
}

/// Operador binario junto con la instrucción que debe emitir.
fn arb_operator() -> impl Strategy<Value = (char, &'static str)> {
    prop::sample::select(vec![
        ('+', "add"),
        ('-', "sub"),
        ('&', "and"),
        ('|', "or"),
        ('<', "lt"),
        ('>', "gt"),
        ('=', "eq"),
        ('*', "call Math.multiply 2"),
        ('/', "call Math.divide 2"),
    ])
}

fn arb_statement() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "let i = i + 1;",
        "if (i < 3) { let i = 0; }",
        "if (i) { do Sys.wait(i); } else { let i = ~i; }",
        "while (i > 0) { let i = i - 1; }",
        "while (true) { if (false) { } }",
        "do Output.printString(\"ok\");",
    ])
}

proptest! {
    #[test]
    fn symbol_indices_count_per_kind(kinds in prop::collection::vec(arb_kind(), 0..40)) {
        let mut table = SymbolTable::new();
        let mut expected = [0u16; 4];

        for (i, &kind) in kinds.iter().enumerate() {
            let slot = kind as usize;
            let index = table.define(format!("v{}", i).as_str().into(), Type::Int, kind);

            prop_assert_eq!(index, Some(expected[slot]));
            expected[slot] += 1;
        }

        table.start_subroutine();
        prop_assert_eq!(table.var_count(Kind::Static), expected[Kind::Static as usize]);
        prop_assert_eq!(table.var_count(Kind::Field), expected[Kind::Field as usize]);
        prop_assert_eq!(table.var_count(Kind::Parameter), 0);
        prop_assert_eq!(table.var_count(Kind::Local), 0);
    }

    #[test]
    fn tokens_reproduce_lexemes(
        lexemes in prop::collection::vec((arb_lexeme(), arb_separator()), 0..30),
    ) {
        let text: String = lexemes
            .iter()
            .flat_map(|(lexeme, separator)| [lexeme.as_str(), *separator])
            .collect();

        let source = Source::new("Test.jack", text);
        let stream = Lexer::new(&source).tokenize();
        prop_assert!(stream.is_ok(), "{:?}", stream.err());

        let found: Vec<_> = stream
            .iter()
            .flat_map(|stream| stream.tokens())
            .map(|token| token.val().lexeme())
            .collect();

        let expected: Vec<_> = lexemes.into_iter().map(|(lexeme, _)| lexeme).collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn operators_apply_left_to_right(
        first in 0..=INT_MAX,
        rest in prop::collection::vec((arb_operator(), 0..=INT_MAX), 0..10),
    ) {
        let mut expression = first.to_string();
        let mut expected = vec![
            "function Main.f 0".to_string(),
            format!("push constant {}", first),
        ];

        for &((operator, instruction), operand) in &rest {
            expression.push_str(&format!(" {} {}", operator, operand));
            expected.push(format!("push constant {}", operand));
            expected.push(instruction.to_string());
        }

        expected.push("return".to_string());

        let text = format!("class Main {{ function int f() {{ return {}; }} }}", expression);
        prop_assert_eq!(compile(&text), expected);
    }

    #[test]
    fn output_is_deterministic_with_unique_labels(
        statements in prop::collection::vec(arb_statement(), 0..12),
    ) {
        let text = format!(
            "class Main {{ function void f() {{ var int i; {} return; }} }}",
            statements.concat()
        );

        let first = compile(&text);
        prop_assert_eq!(&first, &compile(&text));

        let labels: Vec<_> = first.iter().filter(|line| line.starts_with("label ")).collect();
        let unique: HashSet<_> = labels.iter().collect();
        prop_assert_eq!(labels.len(), unique.len());
    }
}

#[test]
fn lexing_stops_at_first_error() {
    let source = Source::new("Test.jack", "ok $ \"unterminated");
    let mut lexer = Lexer::new(&source);

    assert!(matches!(lexer.next(), Some(Ok(token)) if matches!(token.val(), Token::Id(_))));
    assert!(matches!(lexer.next(), Some(Err(_))));
    assert!(lexer.next().is_none());
}
