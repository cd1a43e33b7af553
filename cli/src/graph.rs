use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::{Result, bail};
use console::style;
use dew::{PrefetchResource, prefetch::GraphBuilder};
use dew_core::{DEFAULT_BASE, Manifest, SymbolResolver};

use crate::output;

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Path to the build manifest
    #[arg(long)]
    pub manifest: PathBuf,
    /// Seed symbols; every manifest symbol when omitted
    #[arg(long = "symbol", value_name = "SYMBOL")]
    pub symbols: Vec<String>,
    /// URL prefix of the client build
    #[arg(long, default_value = DEFAULT_BASE)]
    pub base: String,
}

pub fn run(args: GraphArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    if let Some(symbol) = args
        .symbols
        .iter()
        .find(|symbol| manifest.symbol(symbol).is_none())
    {
        bail!("symbol `{symbol}` is not in {}", args.manifest.display());
    }

    let resolver = SymbolResolver::new(&manifest, &args.base, None);
    let builder = GraphBuilder::new(&manifest, &resolver);
    let resources = if args.symbols.is_empty() {
        builder.build(manifest.symbols.keys().map(String::as_str))
    } else {
        builder.build(args.symbols.iter().map(String::as_str))
    };

    output::report(&resources, |resources| {
        for resource in resources {
            print_tree(resource, 0);
        }
    })
}

fn print_tree(resource: &PrefetchResource, depth: usize) {
    let indent = "  ".repeat(depth);
    if depth == 0 {
        println!("{}", style(&resource.url).bold());
    } else {
        println!("{indent}{} {}", style("└").dim(), resource.url);
    }
    for import in &resource.imports {
        print_tree(import, depth + 1);
    }
}
