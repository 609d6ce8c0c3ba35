use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use formula_cost::{
    evaluate, Catalog, CostError, NamePrecedence, ResolverOptions, SymbolTable,
    UnresolvedSymbolPolicy,
};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "formula-cost")]
#[command(about = "Compute product costs from a catalog of cost variables and product formulas.")]
struct Cli {
    /// Log resolution steps to stderr (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute the cost of one product.
    Cost(CostArgs),
    /// Evaluate a standalone formula over `--var` bindings.
    Eval(EvalArgs),
    /// List the variables and products a product's formula refers to.
    Deps(DepsArgs),
    /// Compute the cost of every product in the catalog.
    ///
    /// Products that fail are listed with their error; the command itself still succeeds.
    Report(ReportArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum UnresolvedArg {
    Fail,
    Zero,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PreferArg {
    Products,
    Variables,
}

#[derive(Debug, Args)]
struct CatalogArgs {
    /// Catalog JSON file with `variables`, `products` and optional `options`.
    #[arg(long, value_name = "PATH")]
    catalog: PathBuf,

    /// How to treat names that match no variable or product (overrides the catalog).
    #[arg(long, value_enum)]
    unresolved: Option<UnresolvedArg>,

    /// Namespace that wins when a name is both a variable and a product (overrides the catalog).
    #[arg(long, value_enum)]
    prefer: Option<PreferArg>,
}

#[derive(Debug, Args)]
struct CostArgs {
    #[command(flatten)]
    catalog: CatalogArgs,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Product name (matched ignoring case and spacing).
    product: String,
}

#[derive(Debug, Args)]
struct EvalArgs {
    /// Variable binding as `NAME=VALUE` (repeatable).
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_binding)]
    vars: Vec<(String, f64)>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    formula: String,
}

#[derive(Debug, Args)]
struct DepsArgs {
    #[command(flatten)]
    catalog: CatalogArgs,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    product: String,
}

#[derive(Debug, Args)]
struct ReportArgs {
    #[command(flatten)]
    catalog: CatalogArgs,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct JsonCost<'a> {
    product: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> JsonCost<'a> {
    fn new(product: &'a str, result: &Result<f64, CostError>) -> Self {
        match result {
            Ok(cost) => Self {
                product,
                cost: Some(*cost),
                error: None,
            },
            Err(err) => Self {
                product,
                cost: None,
                error: Some(err.to_string()),
            },
        }
    }
}

fn parse_binding(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))?;
    if name.trim().is_empty() {
        return Err(format!("missing variable name in {raw:?}"));
    }
    let value: f64 = value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("invalid number {:?} for {:?}", value.trim(), name.trim()))?;
    Ok((name.trim().to_string(), value))
}

fn load_catalog(args: &CatalogArgs) -> Result<Catalog> {
    let json = std::fs::read_to_string(&args.catalog)
        .with_context(|| format!("read catalog {}", args.catalog.display()))?;
    let mut catalog = Catalog::from_json_str(&json)
        .with_context(|| format!("load catalog {}", args.catalog.display()))?;
    catalog.options = override_options(catalog.options, args);
    log::debug!(
        "loaded {} variables and {} products from {}",
        catalog.variables.len(),
        catalog.products.len(),
        args.catalog.display()
    );
    Ok(catalog)
}

fn override_options(mut options: ResolverOptions, args: &CatalogArgs) -> ResolverOptions {
    if let Some(unresolved) = args.unresolved {
        options.unresolved_symbols = match unresolved {
            UnresolvedArg::Fail => UnresolvedSymbolPolicy::Fail,
            UnresolvedArg::Zero => UnresolvedSymbolPolicy::Zero,
        };
    }
    if let Some(prefer) = args.prefer {
        options.precedence = match prefer {
            PreferArg::Products => NamePrecedence::Products,
            PreferArg::Variables => NamePrecedence::Variables,
        };
    }
    options
}

fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn run_cost(args: CostArgs, out: &mut impl Write) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    let result = catalog.resolver().cost(&args.product);
    if let OutputFormat::Json = args.format {
        write_json(out, &JsonCost::new(&args.product, &result))?;
    }
    let cost = result.with_context(|| format!("cost of {:?}", args.product))?;
    if let OutputFormat::Text = args.format {
        writeln!(out, "{}: {cost:.2}", display_name(&catalog, &args.product))?;
    }
    Ok(())
}

fn run_eval(args: EvalArgs, out: &mut impl Write) -> Result<()> {
    let symbols: SymbolTable = args
        .vars
        .iter()
        .map(|(name, value)| (name.as_str(), *value))
        .collect();
    let value = evaluate(&args.formula, &symbols)
        .with_context(|| format!("evaluate {:?}", args.formula))?;
    match args.format {
        OutputFormat::Text => writeln!(out, "{value}")?,
        OutputFormat::Json => write_json(out, &serde_json::json!({ "value": value }))?,
    }
    Ok(())
}

fn run_deps(args: DepsArgs, out: &mut impl Write) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    let deps = catalog
        .resolver()
        .dependencies(&args.product)
        .with_context(|| format!("dependencies of {:?}", args.product))?;
    match args.format {
        OutputFormat::Json => write_json(out, &deps)?,
        OutputFormat::Text => {
            let list = |names: &[String]| {
                if names.is_empty() {
                    "(none)".to_string()
                } else {
                    names.join(", ")
                }
            };
            writeln!(out, "products: {}", list(&deps.products))?;
            writeln!(out, "variables: {}", list(&deps.variables))?;
            writeln!(out, "unresolved: {}", list(&deps.unresolved))?;
        }
    }
    Ok(())
}

fn run_report(args: ReportArgs, out: &mut impl Write) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    let report = catalog.resolver().report();
    match args.format {
        OutputFormat::Json => {
            let rows: Vec<JsonCost<'_>> = report
                .iter()
                .map(|row| JsonCost::new(&row.name, &row.cost))
                .collect();
            write_json(out, &rows)?;
        }
        OutputFormat::Text => {
            for row in &report {
                match &row.cost {
                    Ok(cost) => writeln!(out, "{}: {cost:.2}", row.name)?,
                    Err(err) => writeln!(out, "{}: error: {err}", row.name)?,
                }
            }
        }
    }
    Ok(())
}

fn display_name<'a>(catalog: &'a Catalog, product: &'a str) -> &'a str {
    catalog
        .products
        .get(product)
        .map_or(product, |p| p.name.as_str())
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|io_err| io_err.kind() == io::ErrorKind::BrokenPipe)
    })
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = match cli.command {
        Command::Cost(args) => run_cost(args, &mut out),
        Command::Eval(args) => run_eval(args, &mut out),
        Command::Deps(args) => run_deps(args, &mut out),
        Command::Report(args) => run_report(args, &mut out),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        // A consumer that stops reading early (e.g. `| head`) is not an error.
        Err(err) if is_broken_pipe(&err) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_bindings() {
        assert_eq!(
            parse_binding("Peso 50x50 = 1.5"),
            Ok(("Peso 50x50".to_string(), 1.5))
        );
        assert!(parse_binding("semvalor").is_err());
        assert!(parse_binding("=3").is_err());
        assert!(parse_binding("A=abc").is_err());
        assert!(parse_binding("A=inf").is_err());
    }

    #[test]
    fn cli_flags_override_catalog_options() {
        let args = CatalogArgs {
            catalog: PathBuf::from("catalog.json"),
            unresolved: Some(UnresolvedArg::Zero),
            prefer: None,
        };
        let options = override_options(
            ResolverOptions {
                unresolved_symbols: UnresolvedSymbolPolicy::Fail,
                precedence: NamePrecedence::Variables,
            },
            &args,
        );
        assert_eq!(options.unresolved_symbols, UnresolvedSymbolPolicy::Zero);
        assert_eq!(options.precedence, NamePrecedence::Variables);
    }

    #[test]
    fn eval_writes_value() {
        let mut out = Vec::new();
        run_eval(
            EvalArgs {
                vars: vec![("Frete".to_string(), 4.0)],
                format: OutputFormat::Text,
                formula: "frete / 2 + 1".to_string(),
            },
            &mut out,
        )
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "3\n");
    }
}
