//! Operation table mapping subcommands onto [`QueryFacade`] calls.

use anyhow::{Result, anyhow};
use blogkb_core::{QueryFacade, SectionKind};
use futures::future::BoxFuture;
use tracing::debug;

use crate::cli::Commands;
use crate::output::{Output, SearchScope};

/// Runs one subcommand against the facade.
pub type Handler = for<'a> fn(&'a dyn QueryFacade, &'a Commands) -> BoxFuture<'a, Result<Output>>;

/// One entry of the operation table.
#[derive(Clone, Copy)]
pub struct Operation {
    /// Subcommand name.
    pub name: &'static str,
    /// Implementation of the subcommand.
    pub handler: Handler,
}

/// Every subcommand and the handler that implements it.
pub const OPERATIONS: &[Operation] = &[
    Operation {
        name: "search",
        handler: search,
    },
    Operation {
        name: "docs",
        handler: search,
    },
    Operation {
        name: "experience",
        handler: search,
    },
    Operation {
        name: "category",
        handler: category,
    },
    Operation {
        name: "recent",
        handler: recent,
    },
    Operation {
        name: "refresh",
        handler: refresh,
    },
    Operation {
        name: "health",
        handler: health,
    },
    Operation {
        name: "show",
        handler: show,
    },
    Operation {
        name: "summary",
        handler: summary,
    },
    Operation {
        name: "raw",
        handler: raw,
    },
];

impl Commands {
    /// Name of this command in [`OPERATIONS`].
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Search(_) => "search",
            Self::Docs(_) => "docs",
            Self::Experience(_) => "experience",
            Self::Category { .. } => "category",
            Self::Recent { .. } => "recent",
            Self::Refresh => "refresh",
            Self::Health => "health",
            Self::Show { .. } => "show",
            Self::Summary { .. } => "summary",
            Self::Raw => "raw",
        }
    }
}

/// Run `command` against `facade` through its entry in [`OPERATIONS`].
pub async fn execute(facade: &dyn QueryFacade, command: &Commands) -> Result<Output> {
    let op = OPERATIONS
        .iter()
        .find(|op| op.name == command.name())
        .ok_or_else(|| anyhow!("no handler registered for '{}'", command.name()))?;
    debug!("Dispatching {}", op.name);
    (op.handler)(facade, command).await
}

fn mismatch(handler: &str, command: &Commands) -> anyhow::Error {
    anyhow!("'{}' routed to the {handler} handler", command.name())
}

fn search<'a>(facade: &'a dyn QueryFacade, command: &'a Commands) -> BoxFuture<'a, Result<Output>> {
    Box::pin(async move {
        let (scope, args) = match command {
            Commands::Search(args) => (SearchScope::All, args),
            Commands::Docs(args) => (SearchScope::Documentation, args),
            Commands::Experience(args) => (SearchScope::Experience, args),
            other => return Err(mismatch("search", other)),
        };
        let query = args.query();
        let hits = match scope {
            SearchScope::All => facade.search_all(&query, args.limit).await?,
            SearchScope::Documentation => facade.search_documentation(&query, args.limit).await?,
            SearchScope::Experience => facade.search_experience(&query, args.limit).await?,
        };
        Ok(Output::Hits { scope, query, hits })
    })
}

fn category<'a>(
    facade: &'a dyn QueryFacade,
    command: &'a Commands,
) -> BoxFuture<'a, Result<Output>> {
    Box::pin(async move {
        let Commands::Category { name } = command else {
            return Err(mismatch("category", command));
        };
        Ok(Output::Sections {
            heading: format!("Posts in category '{name}'"),
            sections: facade.get_category_posts(name).await?,
        })
    })
}

fn recent<'a>(facade: &'a dyn QueryFacade, command: &'a Commands) -> BoxFuture<'a, Result<Output>> {
    Box::pin(async move {
        let Commands::Recent { days, category } = command else {
            return Err(mismatch("recent", command));
        };
        let sections = facade.get_recent_posts(*days, category.as_deref()).await?;
        let heading = match category {
            Some(category) => format!("Posts from the last {days} days in '{category}'"),
            None => format!("Posts from the last {days} days"),
        };
        Ok(Output::Sections { heading, sections })
    })
}

fn refresh<'a>(facade: &'a dyn QueryFacade, _: &'a Commands) -> BoxFuture<'a, Result<Output>> {
    Box::pin(async move {
        Ok(Output::Refreshed {
            counts: facade.refresh_content().await?,
        })
    })
}

fn health<'a>(facade: &'a dyn QueryFacade, _: &'a Commands) -> BoxFuture<'a, Result<Output>> {
    Box::pin(async move {
        Ok(Output::Health {
            report: facade.health_check(),
        })
    })
}

fn show<'a>(facade: &'a dyn QueryFacade, command: &'a Commands) -> BoxFuture<'a, Result<Output>> {
    Box::pin(async move {
        let Commands::Show { title } = command else {
            return Err(mismatch("show", command));
        };
        let title = title.join(" ");
        Ok(match facade.full_content(&title).await? {
            Some(content) => Output::Content { title, content },
            None => Output::NotFound {
                message: format!("No section found matching title: '{title}'"),
            },
        })
    })
}

fn summary<'a>(
    facade: &'a dyn QueryFacade,
    command: &'a Commands,
) -> BoxFuture<'a, Result<Output>> {
    Box::pin(async move {
        let Commands::Summary { kind } = command else {
            return Err(mismatch("summary", command));
        };
        let kind = SectionKind::from(*kind);
        Ok(Output::Summary {
            kind,
            items: facade.summary(kind).await?,
        })
    })
}

fn raw<'a>(facade: &'a dyn QueryFacade, _: &'a Commands) -> BoxFuture<'a, Result<Output>> {
    Box::pin(async move {
        Ok(Output::Raw {
            content: facade.raw_document().await?,
        })
    })
}
