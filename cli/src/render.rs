use std::path::PathBuf;

use clap::{Args, ValueEnum};
use color_eyre::eyre::Result;
use dew::{PrefetchImplementation, RenderOptions, Renderer, SymbolsToPrefetch};
use dew_core::Manifest;

use crate::{config::Config, output, tree::TreeNode};

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Path to the build manifest
    #[arg(long)]
    pub manifest: PathBuf,
    /// Path to the JSON component tree
    #[arg(long)]
    pub tree: PathBuf,
    /// Path to a `dew.toml` configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Which symbols to prefetch
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,
    /// How prefetch resources are written into the document
    #[arg(long, value_enum)]
    pub implementation: Option<Implementation>,
    /// URL prefix of the client build
    #[arg(long)]
    pub base: Option<String>,
    /// Skip snapshot capture
    #[arg(long)]
    pub no_snapshot: bool,
    /// Render a fragment wrapped in this element instead of a full document
    #[arg(long, value_name = "TAG")]
    pub fragment: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Strategy {
    All,
    AllDocument,
    EventsDocument,
}

impl From<Strategy> for SymbolsToPrefetch {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::All => Self::All,
            Strategy::AllDocument => Self::AllDocument,
            Strategy::EventsDocument => Self::EventsDocument,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Implementation {
    LinkPrefetchHtml,
    LinkPrefetch,
    LinkPreloadHtml,
    LinkPreload,
    LinkModulepreloadHtml,
    LinkModulepreload,
    WorkerFetch,
    None,
}

impl From<Implementation> for PrefetchImplementation {
    fn from(implementation: Implementation) -> Self {
        match implementation {
            Implementation::LinkPrefetchHtml => Self::LinkPrefetchHtml,
            Implementation::LinkPrefetch => Self::LinkPrefetch,
            Implementation::LinkPreloadHtml => Self::LinkPreloadHtml,
            Implementation::LinkPreload => Self::LinkPreload,
            Implementation::LinkModulepreloadHtml => Self::LinkModulepreloadHtml,
            Implementation::LinkModulepreload => Self::LinkModulepreload,
            Implementation::WorkerFetch => Self::WorkerFetch,
            Implementation::None => Self::None,
        }
    }
}

impl RenderArgs {
    /// Layers command line flags over the configuration file.
    fn options(&self) -> Result<RenderOptions> {
        let mut options = match &self.config {
            Some(path) => Config::load(path)?.render,
            None => RenderOptions::default(),
        };
        if let Some(strategy) = self.strategy {
            options.prefetch_strategy.symbols_to_prefetch = strategy.into();
        }
        if let Some(implementation) = self.implementation {
            options.prefetch_strategy.implementation = implementation.into();
        }
        if let Some(base) = &self.base {
            options.base = Some(base.clone());
        }
        if self.no_snapshot {
            options.snapshot = false;
        }
        if let Some(tag) = &self.fragment {
            options.fragment_tag_name = Some(tag.clone());
        }
        Ok(options)
    }
}

pub fn run(args: RenderArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    let tree = TreeNode::load(&args.tree)?;
    let options = args.options()?;
    tracing::debug!(?options, "render options");

    let renderer = Renderer::new(manifest);
    let result = renderer.render_to_string(&tree, &options)?;
    tracing::info!(
        "rendered in {:.2?} (document {:.2?}, serialization {:.2?})",
        result.timing.render,
        result.timing.create_document,
        result.timing.to_string
    );

    output::report(&result, |result| println!("{}", result.html))?;
    if let Some(state) = &result.snapshot_state {
        output::summary(
            "snapshot",
            format!(
                "{} values, {} anchors, {} subscriptions",
                state.objs.len(),
                state.listeners.len(),
                state.subscriptions.len()
            ),
        );
    }
    output::summary(
        "prefetch",
        format!(
            "{} bundles",
            dew::PrefetchResource::flatten(&result.prefetch_resources).len()
        ),
    );
    Ok(())
}
