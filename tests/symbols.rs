use jackc::{
    lex::Identifier,
    symbols::{Kind, SymbolTable, Type},
};

fn class(name: &str) -> Type {
    Type::Class(Identifier::from(name))
}

#[test]
fn indices_are_sequential_per_kind() {
    let mut table = SymbolTable::new();

    assert_eq!(table.define("count".into(), Type::Int, Kind::Static), Some(0));
    assert_eq!(table.define("x".into(), Type::Int, Kind::Field), Some(0));
    assert_eq!(table.define("y".into(), Type::Int, Kind::Field), Some(1));
    assert_eq!(table.define("label".into(), class("String"), Kind::Field), Some(2));
    assert_eq!(table.define("total".into(), Type::Int, Kind::Static), Some(1));

    assert_eq!(table.var_count(Kind::Static), 2);
    assert_eq!(table.var_count(Kind::Field), 3);
    assert_eq!(table.index_of("label"), Some(2));
    assert_eq!(table.type_of("label"), Some(&class("String")));
    assert_eq!(table.kind_of("total"), Some(Kind::Static));
}

#[test]
fn start_subroutine_resets_only_subroutine_scope() {
    let mut table = SymbolTable::new();
    table.define("size".into(), Type::Int, Kind::Field);

    table.start_subroutine();
    table.define("a".into(), Type::Int, Kind::Parameter);
    table.define("b".into(), Type::Int, Kind::Parameter);
    table.define("i".into(), Type::Int, Kind::Local);

    table.start_subroutine();
    assert_eq!(table.kind_of("a"), None);
    assert_eq!(table.kind_of("i"), None);
    assert_eq!(table.var_count(Kind::Parameter), 0);
    assert_eq!(table.var_count(Kind::Local), 0);

    assert_eq!(table.define("c".into(), Type::Char, Kind::Parameter), Some(0));
    assert_eq!(table.define("j".into(), Type::Int, Kind::Local), Some(0));

    // El ámbito de clase sobrevive
    assert_eq!(table.kind_of("size"), Some(Kind::Field));
    assert_eq!(table.define("other".into(), Type::Int, Kind::Field), Some(1));
}

#[test]
fn subroutine_scope_shadows_class_scope() {
    let mut table = SymbolTable::new();
    table.define("x".into(), Type::Int, Kind::Field);
    table.define("y".into(), Type::Int, Kind::Field);

    table.start_subroutine();
    table.define("x".into(), Type::Boolean, Kind::Local);

    let symbol = table.lookup("x").unwrap();
    assert_eq!(symbol.kind, Kind::Local);
    assert_eq!(symbol.typ, Type::Boolean);
    assert_eq!(symbol.index, 0);

    assert_eq!(table.kind_of("y"), Some(Kind::Field));
    assert_eq!(table.index_of("y"), Some(1));
}

#[test]
fn unknown_names_resolve_to_none() {
    let table = SymbolTable::new();
    assert!(table.lookup("ghost").is_none());
    assert_eq!(table.kind_of("ghost"), None);
    assert_eq!(table.type_of("ghost"), None);
    assert_eq!(table.index_of("ghost"), None);
}

#[test]
fn primitive_types_are_distinguished_from_classes() {
    assert!(Type::Int.is_primitive());
    assert!(Type::Char.is_primitive());
    assert!(Type::Boolean.is_primitive());
    assert!(!class("Array").is_primitive());
    assert_eq!(class("Array").to_string(), "Array");
    assert_eq!(Type::Boolean.to_string(), "boolean");
}
