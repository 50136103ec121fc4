//! Adapter setup: config + credentials → registry.
//!
//! Only sources that have planned units are built. A planned source without
//! credentials is a setup error, reported before anything is fetched.

use tickerfeed_core::domain::SourceKind;
use tickerfeed_core::source::{
    NewsApi, RedditApi, SourceAdapter, SourceError, SourceRegistry, XApi,
};

use crate::config::{ConfigError, Credentials, IngestConfig, ENV_X_API_KEY};
use crate::plan::QueryPlan;

pub fn build_registry(
    config: &IngestConfig,
    credentials: &Credentials,
    plan: &QueryPlan,
) -> Result<SourceRegistry, ConfigError> {
    let user_agent = config.run.user_agent.as_str();
    let mut adapters = Vec::new();

    let x_units = plan.units_for(SourceKind::X);
    if x_units > 0 {
        let key = credentials
            .x_api_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential {
                source_kind: SourceKind::X,
                var: ENV_X_API_KEY,
                units: x_units,
            })?;
        let api = XApi::new(key, &config.x.base_url, config.x.query_type, user_agent)
            .map_err(client_error(SourceKind::X))?;
        adapters.push(SourceAdapter::XSearch(api.clone()));
        adapters.push(SourceAdapter::XTimeline(api));
    }

    let reddit_units = plan.units_for(SourceKind::Reddit);
    if reddit_units > 0 {
        let creds = credentials
            .reddit()
            .map_err(|var| ConfigError::MissingCredential {
                source_kind: SourceKind::Reddit,
                var,
                units: reddit_units,
            })?;
        let api = RedditApi::new(creds, user_agent)
            .map_err(client_error(SourceKind::Reddit))?
            .with_listing_limit(config.reddit.posts_limit)
            .with_comment_limits(config.reddit.comment_limit, config.reddit.comment_depth)
            .with_more_limit(config.reddit.more_limit);
        adapters.push(SourceAdapter::RedditListing(api.clone()));
        if config.run.fetch_comments {
            adapters.push(SourceAdapter::RedditComments(api));
        }
    }

    if plan.units_for(SourceKind::News) > 0 {
        let api = NewsApi::new(&config.news.base_url, user_agent)
            .map_err(client_error(SourceKind::News))?
            .with_locale(config.news.locale.clone());
        adapters.push(SourceAdapter::NewsFeed(api));
    }

    let registry = SourceRegistry::from_adapters(adapters);
    tracing::debug!(adapters = registry.len(), "source registry built");
    Ok(registry)
}

fn client_error(source_kind: SourceKind) -> impl Fn(SourceError) -> ConfigError {
    move |e| ConfigError::Client {
        source_kind,
        message: e.to_string(),
    }
}
