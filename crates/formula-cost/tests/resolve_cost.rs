use formula_cost::{
    evaluate, resolve_cost, CostError, ProductTable, ResolutionContext, Resolver, SymbolTable,
    VariableTable,
};
use pretty_assertions::assert_eq;

fn variables(pairs: &[(&str, f64)]) -> VariableTable {
    VariableTable::from_pairs(pairs.iter().copied()).unwrap()
}

fn products(pairs: &[(&str, &str)]) -> ProductTable {
    ProductTable::from_pairs(pairs.iter().copied()).unwrap()
}

fn diamond() -> ProductTable {
    products(&[("A", "10"), ("B", "A * 2"), ("C", "A + 5"), ("D", "B + C")])
}

#[test]
fn pure_variable_formula() {
    let vars = variables(&[("A", 10.0), ("B", 2.0)]);
    let prods = products(&[("P", "A + B")]);
    assert_eq!(resolve_cost("P", &vars, &prods), Ok(12.0));
}

#[test]
fn diamond_dependency_evaluates_shared_product_once() {
    let vars = VariableTable::new();
    let prods = diamond();
    let resolver = Resolver::new(&vars, &prods);

    let mut ctx = ResolutionContext::new();
    assert_eq!(resolver.cost_in("D", &mut ctx), Ok(35.0));
    // A, B, C and D each evaluated exactly once.
    assert_eq!(ctx.evaluations(), 4);
    assert_eq!(ctx.memoized("A"), Some(10.0));
    assert_eq!(ctx.memoized("B"), Some(20.0));
    assert_eq!(ctx.memoized("C"), Some(15.0));
}

#[test]
fn memo_is_reused_across_calls_with_the_same_context() {
    let vars = VariableTable::new();
    let prods = diamond();
    let resolver = Resolver::new(&vars, &prods);

    let mut ctx = ResolutionContext::new();
    resolver.cost_in("B", &mut ctx).unwrap();
    assert_eq!(ctx.evaluations(), 2);
    resolver.cost_in("D", &mut ctx).unwrap();
    assert_eq!(ctx.evaluations(), 4);
}

#[test]
fn repeated_queries_are_deterministic() {
    let vars = variables(&[("Frete", 3.5)]);
    let prods = products(&[
        ("Base", "Frete * 2"),
        ("Kit", "Base + Base / 4"),
        ("Quebrado", "Kit + Inexistente"),
    ]);
    let first = resolve_cost("Kit", &vars, &prods);
    let failing = resolve_cost("Quebrado", &vars, &prods);
    for _ in 0..10 {
        assert_eq!(resolve_cost("Kit", &vars, &prods), first);
        assert_eq!(resolve_cost("Quebrado", &vars, &prods), failing);
    }
    assert_eq!(first, Ok(8.75));
}

#[test]
fn two_product_cycle_reports_full_path() {
    let vars = VariableTable::new();
    let prods = products(&[("X", "Y * 2"), ("Y", "X + 1")]);

    let err = resolve_cost("X", &vars, &prods).unwrap_err();
    assert_eq!(
        err.root_cause(),
        &CostError::CircularDependency {
            path: vec!["X".to_string(), "Y".to_string(), "X".to_string()],
        }
    );
    assert_eq!(err.product_trail(), vec!["X", "Y"]);
}

#[test]
fn self_reference_is_a_cycle() {
    let vars = VariableTable::new();
    let prods = products(&[("Z", "Z + 1")]);

    let err = resolve_cost("Z", &vars, &prods).unwrap_err();
    assert_eq!(
        err.root_cause(),
        &CostError::CircularDependency {
            path: vec!["Z".to_string(), "Z".to_string()],
        }
    );
}

#[test]
fn cycle_below_the_target_reports_only_the_active_chain() {
    let vars = VariableTable::new();
    let prods = products(&[("Top", "M + 1"), ("M", "N"), ("N", "m * 2")]);

    let err = resolve_cost("Top", &vars, &prods).unwrap_err();
    assert_eq!(
        err.root_cause(),
        &CostError::CircularDependency {
            path: vec![
                "Top".to_string(),
                "M".to_string(),
                "N".to_string(),
                "M".to_string()
            ],
        }
    );
}

#[test]
fn completed_siblings_are_not_cycles() {
    let vars = VariableTable::new();
    let prods = products(&[("A", "1"), ("B", "A + A"), ("C", "A + B")]);
    assert_eq!(resolve_cost("C", &vars, &prods), Ok(3.0));
}

#[test]
fn unknown_reference_fails_fast() {
    let vars = VariableTable::new();
    let prods = products(&[("Q", "UNDEFINED_VAR + 1")]);

    let err = resolve_cost("Q", &vars, &prods).unwrap_err();
    assert_eq!(
        err,
        CostError::InProduct {
            product: "Q".to_string(),
            cause: Box::new(CostError::UnknownSymbol("UNDEFINED_VAR".to_string())),
        }
    );
}

#[test]
fn unknown_target_product() {
    let vars = VariableTable::new();
    let prods = products(&[("A", "1")]);
    assert_eq!(
        resolve_cost("B", &vars, &prods),
        Err(CostError::UnknownProduct("B".to_string()))
    );
}

#[test]
fn division_by_zero_from_a_variable() {
    let symbols: SymbolTable = [("DIVISOR", 0.0)].into_iter().collect();
    assert_eq!(
        evaluate("10 / DIVISOR", &symbols),
        Err(CostError::DivisionByZero)
    );
}

#[test]
fn nested_errors_carry_every_enclosing_product() {
    let vars = variables(&[("Zero", 0.0)]);
    let prods = products(&[
        ("Outer", "Middle + 1"),
        ("Middle", "Inner * 2"),
        ("Inner", "5 / Zero"),
    ]);

    let err = resolve_cost("Outer", &vars, &prods).unwrap_err();
    assert_eq!(err.root_cause(), &CostError::DivisionByZero);
    assert_eq!(err.product_trail(), vec!["Outer", "Middle", "Inner"]);
    assert_eq!(
        err.to_string(),
        "in product Outer: in product Middle: in product Inner: division by zero"
    );
}

#[test]
fn syntax_errors_are_attributed_to_their_product() {
    let vars = variables(&[("A", 1.0)]);
    let prods = products(&[("Ruim", "A * (2 + 3"), ("Usa Ruim", "Ruim + 1")]);

    let err = resolve_cost("usa ruim", &vars, &prods).unwrap_err();
    assert_eq!(err.product_trail(), vec!["Usa Ruim", "Ruim"]);
    assert!(matches!(
        err.root_cause(),
        CostError::Syntax { offset: 10, .. }
    ));
}

#[test]
fn names_match_across_case_and_spacing() {
    let vars = variables(&[("Peso 50x50", 1.8), ("Perda Corte", 0.25)]);
    let prods = products(&[
        ("Placa 50x50", "peso_50x50 * (1 + PERDA   CORTE)"),
        ("Caixa", "placa_50x50 * 4"),
    ]);

    assert_eq!(resolve_cost("Placa 50x50", &vars, &prods), Ok(2.25));
    assert_eq!(resolve_cost("caixa", &vars, &prods), Ok(9.0));
}

#[test]
fn decomposed_accents_match_composed_names() {
    let vars = variables(&[("Preço", 2.0)]);
    let prods = products(&[("P", "Prec\u{0327}o * 3"), ("Café Moído", "P + 1")]);

    assert_eq!(resolve_cost("P", &vars, &prods), Ok(6.0));
    assert_eq!(resolve_cost("Cafe\u{0301} Moi\u{0301}do", &vars, &prods), Ok(7.0));
}

#[test]
fn overly_nested_formula_is_a_syntax_error() {
    let nested = format!("{}Base{}", "(".repeat(10_000), ")".repeat(10_000));
    let vars = variables(&[("Base", 1.0)]);
    let prods = products(&[("Fundo", nested.as_str())]);

    let err = resolve_cost("Fundo", &vars, &prods).unwrap_err();
    assert_eq!(err.product_trail(), vec!["Fundo"]);
    assert!(matches!(
        err.root_cause(),
        CostError::Syntax { offset: 256, .. }
    ));
}

#[test]
fn substring_names_do_not_interfere() {
    let vars = variables(&[("prod", 2.0), ("produto", 100.0)]);
    let prods = products(&[("Total", "produto - prod")]);
    assert_eq!(resolve_cost("Total", &vars, &prods), Ok(98.0));
}

#[test]
fn negative_dependency_costs_are_not_spliced_as_text() {
    let vars = VariableTable::new();
    let prods = products(&[("Credito", "-4"), ("Liquido", "10 - Credito")]);
    assert_eq!(resolve_cost("Liquido", &vars, &prods), Ok(14.0));
}

#[test]
fn snapshots_are_shared_across_threads() {
    let vars = variables(&[("Frete", 2.0)]);
    let prods = products(&[("A", "Frete * 5"), ("B", "A + 1"), ("C", "B * A")]);

    let (vars, prods) = (&vars, &prods);
    std::thread::scope(|scope| {
        let handles: Vec<_> = ["A", "B", "C"]
            .into_iter()
            .map(|target| scope.spawn(move || resolve_cost(target, vars, prods)))
            .collect();
        let costs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(costs, vec![Ok(10.0), Ok(11.0), Ok(110.0)]);
    });
}
