use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use querybody::config::DEFAULT_RANDOM_SCORE_FIELD;
use querybody::{Query, QuerySettings};
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Parser)]
#[command(name = "querybody")]
#[command(about = "Build search and count request bodies for an Elasticsearch-compatible API", long_about = None)]
struct Args {
    /// Require a field to exist (repeatable)
    #[arg(long)]
    exists: Vec<String>,

    /// Require a field to be missing (repeatable)
    #[arg(long)]
    missing: Vec<String>,

    /// Restrict a field to values, as `field=a,b,c` (repeatable)
    #[arg(long)]
    terms: Vec<String>,

    /// Exclude values of a field, as `field=a,b,c` (repeatable)
    #[arg(long)]
    exclude_terms: Vec<String>,

    /// Comma-separated document ids to match
    #[arg(long, value_delimiter = ',')]
    ids: Vec<String>,

    /// Comma-separated document ids to exclude
    #[arg(long, value_delimiter = ',')]
    exclude_ids: Vec<String>,

    /// Regular expression on a field, as `field=pattern` (repeatable)
    #[arg(long)]
    regexp: Vec<String>,

    /// Wrap the filter in a seeded random score
    #[arg(long)]
    random_score: Option<i64>,

    /// Field used for random scoring
    #[arg(long, env = "QUERYBODY_RANDOM_SCORE_FIELD", default_value = DEFAULT_RANDOM_SCORE_FIELD)]
    random_score_field: String,

    /// Terms aggregation, as `name=field` or `name=field:size` (repeatable)
    #[arg(long)]
    terms_agg: Vec<String>,

    /// Metric aggregation, as `name=func:field` (repeatable)
    #[arg(long)]
    metric_agg: Vec<String>,

    /// Histogram aggregation, as `name=field:min:max:bins` (repeatable)
    #[arg(long)]
    hist_agg: Vec<String>,

    /// Consolidate aggregations into a composite, as `name:size`
    #[arg(long)]
    composite: Option<String>,

    /// Keep a bucket for documents missing a composite source field
    #[arg(long)]
    keep_missing: bool,

    /// After key JSON object from a previous composite page
    #[arg(long, requires = "composite")]
    after_key: Option<String>,

    /// Print the count body instead of the search body
    #[arg(long)]
    count: bool,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,
}

fn split_pair<'a>(spec: &'a str, sep: char, what: &str) -> Result<(&'a str, &'a str)> {
    spec.split_once(sep)
        .filter(|(left, right)| !left.is_empty() && !right.is_empty())
        .ok_or_else(|| anyhow!("Invalid {} '{}': expected '{}' separator", what, spec, sep))
}

fn split_values(values: &str) -> Vec<String> {
    values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn apply_filters(query: &mut Query, args: &Args) -> Result<()> {
    for field in &args.exists {
        query.exists(field.as_str(), true);
    }
    for field in &args.missing {
        query.exists(field.as_str(), false);
    }
    for spec in &args.terms {
        let (field, values) = split_pair(spec, '=', "terms")?;
        query.terms(field, split_values(values), true);
    }
    for spec in &args.exclude_terms {
        let (field, values) = split_pair(spec, '=', "terms")?;
        query.terms(field, split_values(values), false);
    }
    if !args.ids.is_empty() {
        query.ids(args.ids.iter().cloned(), true);
    }
    if !args.exclude_ids.is_empty() {
        query.ids(args.exclude_ids.iter().cloned(), false);
    }
    for spec in &args.regexp {
        let (field, pattern) = split_pair(spec, '=', "regexp")?;
        query.regexp(field, pattern);
    }
    if let Some(seed) = args.random_score {
        query.random_score(seed);
    }
    Ok(())
}

fn apply_aggregations(query: &mut Query, args: &Args) -> Result<()> {
    for spec in &args.terms_agg {
        let (name, target) = split_pair(spec, '=', "terms aggregation")?;
        match target.split_once(':') {
            Some((field, size)) => {
                let size: u64 = size
                    .parse()
                    .with_context(|| format!("Invalid size in terms aggregation '{}'", spec))?;
                query.terms_aggs(name, "terms", field, size);
            }
            None => query.term_aggs(name, target),
        }
    }
    for spec in &args.metric_agg {
        let (name, target) = split_pair(spec, '=', "metric aggregation")?;
        let (func, field) = split_pair(target, ':', "metric aggregation")?;
        query.metric_aggs(name, func, field);
    }
    for spec in &args.hist_agg {
        let (name, target) = split_pair(spec, '=', "histogram aggregation")?;
        let parts: Vec<&str> = target.split(':').collect();
        let [field, min, max, bins] = parts.as_slice() else {
            bail!(
                "Invalid histogram aggregation '{}': expected name=field:min:max:bins",
                spec
            );
        };
        let min: f64 = min.parse().context("Invalid histogram min")?;
        let max: f64 = max.parse().context("Invalid histogram max")?;
        let bins: u32 = bins.parse().context("Invalid histogram bin count")?;
        query.hist_aggs(name, *field, min, max, bins)?;
    }

    if let Some(spec) = &args.composite {
        let (name, size) = split_pair(spec, ':', "composite")?;
        let size: u64 = size
            .parse()
            .with_context(|| format!("Invalid size in composite '{}'", spec))?;
        query.composite_agg(name, size, !args.keep_missing);

        if let Some(after_key) = &args.after_key {
            let after: Map<String, Value> =
                serde_json::from_str(after_key).context("After key must be a JSON object")?;
            query.composite_agg_after_key(name, after)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    let settings = QuerySettings::default().with_random_score_field(args.random_score_field.as_str());
    let mut query = Query::with_settings(settings);

    apply_filters(&mut query, &args)?;
    apply_aggregations(&mut query, &args)?;
    debug!("Built query: {}", query);

    let body = if args.count {
        query.to_count_body().unwrap_or(Value::Null)
    } else {
        query.to_search_body()
    };

    let output = if args.pretty {
        serde_json::to_string_pretty(&body)?
    } else {
        serde_json::to_string(&body)?
    };
    println!("{}", output);

    Ok(())
}
