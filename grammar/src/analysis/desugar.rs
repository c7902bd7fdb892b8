use itertools::Itertools;

use crate::{Expr, Rule, Rules};

use super::ContractError;

/// Rewrites every rule body with [`desugar_expr`]
pub fn desugar_rules(rules: &Rules) -> Rules {
    rules
        .iter()
        .map(|rule| Rule::new(rule.name.clone(), desugar_expr(&rule.expr)))
        .collect()
}

/// Returns a copy of `expr` which uses only the core operators:
/// - `e?` becomes `e / @empty`
/// - `&e` becomes `!!e`
/// - `e{n,}` becomes `n` copies of `e` followed by `e*` (so `e{0,}` is just `e*`)
pub fn desugar_expr(expr: &Expr) -> Expr {
    match expr {
        Expr::Symbol(_) | Expr::Terminal(_) => expr.clone(),
        Expr::Sequence(exprs) => Expr::Sequence(exprs.iter().map(desugar_expr).collect_vec()),
        Expr::Choice(exprs) => Expr::Choice(exprs.iter().map(desugar_expr).collect_vec()),
        Expr::Negation(e) => Expr::negation(desugar_expr(e)),
        Expr::Star(e) => Expr::star(desugar_expr(e)),

        Expr::Optional(e) => Expr::Choice(vec![desugar_expr(e), Expr::empty()]),
        Expr::Ensure(e) => Expr::negation(Expr::negation(desugar_expr(e))),
        Expr::Repetition { expr, min } => {
            let inner = desugar_expr(expr);
            let mut exprs = vec![inner.clone(); *min];
            exprs.push(Expr::star(inner));
            Expr::sequence(exprs)
        }
    }
}

/// Checks that no sugar expressions remain anywhere in `rules`
pub fn check_desugared(rules: &Rules) -> Result<(), ContractError> {
    for rule in rules {
        if let Some(sugar) = find_sugar(&rule.expr) {
            return Err(ContractError::NotDesugared {
                rule: rule.name.clone(),
                expr: sugar.to_string(),
            });
        }
    }
    Ok(())
}

fn find_sugar(expr: &Expr) -> Option<&Expr> {
    if expr.is_sugar() {
        return Some(expr);
    }
    expr.children().iter().find_map(find_sugar)
}
