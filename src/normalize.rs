use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::dbconfig::GroupDatabases;
use crate::error::BapError;
use crate::store::Store;

pub struct HitSchema {
    pub name_field: &'static str,
    pub extra_fields: &'static [&'static str],
    pub summarize: fn(&Store, &str),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub name: String,
    pub group: String,
    pub database: String,
    pub query_id: String,
    pub query_start: Option<u64>,
    pub query_end: Option<u64>,
    pub ref_acc: String,
    pub ref_start: Option<u64>,
    pub ref_end: Option<u64>,
    pub alignment_length: Option<u64>,
    pub ref_length: Option<u64>,
    pub coverage: f64,
    pub identity: f64,
    pub quality: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseHits {
    pub database: String,
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupHits {
    pub group: String,
    pub databases: Vec<DatabaseHits>,
}

pub fn quality(coverage: f64, identity: f64) -> f64 {
    coverage * identity / 100.0
}

pub fn normalize(
    raw: &Value,
    requested: &GroupDatabases,
    schema: &HitSchema,
    store: &Store,
) -> Result<Vec<GroupHits>, BapError> {
    let hits = if let Some(regions) = raw.get("seq_regions") {
        flat_hits(regions, requested, schema)?
    } else if let Some(results) = locate_results(raw) {
        nested_hits(results, requested, schema)?
    } else {
        debug!("backend output has no results; treating as no hits");
        Vec::new()
    };

    for hit in &hits {
        (schema.summarize)(store, &hit.name);
    }

    Ok(rank(hits, requested))
}

pub fn rank(hits: Vec<Hit>, requested: &GroupDatabases) -> Vec<GroupHits> {
    requested
        .iter()
        .map(|(group, dbs)| GroupHits {
            group: group.clone(),
            databases: dbs
                .iter()
                .map(|db| {
                    let mut db_hits: Vec<Hit> = hits
                        .iter()
                        .filter(|h| &h.group == group && &h.database == db)
                        .cloned()
                        .collect();
                    db_hits.sort_by(|a, b| b.quality.total_cmp(&a.quality));
                    DatabaseHits {
                        database: db.clone(),
                        hits: db_hits,
                    }
                })
                .collect(),
        })
        .collect()
}

fn locate_results(raw: &Value) -> Option<&Map<String, Value>> {
    raw.get("results").and_then(Value::as_object).or_else(|| {
        raw.as_object()?
            .values()
            .find_map(|v| v.get("results").and_then(Value::as_object))
    })
}

fn nested_hits(
    results: &Map<String, Value>,
    requested: &GroupDatabases,
    schema: &HitSchema,
) -> Result<Vec<Hit>, BapError> {
    let mut hits = Vec::new();
    for (group, dbs) in requested {
        let Some(group_results) = results.get(group).and_then(Value::as_object) else {
            continue;
        };
        for db in dbs {
            for hit in hit_records(group_results.get(db)) {
                hits.push(nested_hit(hit, group, db, schema)?);
            }
        }
    }
    Ok(hits)
}

/// Hits stored under a database entry. Marker strings, `null`, absence and
/// empty objects all mean no hits.
fn hit_records(entry: Option<&Value>) -> Vec<&Map<String, Value>> {
    match entry {
        Some(Value::Object(map)) => map.values().filter_map(Value::as_object).collect(),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

fn nested_hit(
    hit: &Map<String, Value>,
    group: &str,
    db: &str,
    schema: &HitSchema,
) -> Result<Hit, BapError> {
    let (coverage, identity) = scores(hit)?;
    let (query_start, query_end) = span(hit.get("positions_in_contig"));
    let (ref_start, ref_end) = span(hit.get("position_in_ref"));
    Ok(Hit {
        name: text(hit, schema.name_field).unwrap_or_else(|| "?unknown?".to_string()),
        group: group.to_string(),
        database: db.to_string(),
        query_id: text(hit, "contig_name").unwrap_or_default(),
        query_start,
        query_end,
        ref_acc: text(hit, "accession").unwrap_or_default(),
        ref_start,
        ref_end,
        alignment_length: count(hit.get("HSP_length")),
        ref_length: count(hit.get("template_length")),
        coverage,
        identity,
        quality: quality(coverage, identity),
        extra: extras(hit, schema),
    })
}

fn flat_hits(
    regions: &Value,
    requested: &GroupDatabases,
    schema: &HitSchema,
) -> Result<Vec<Hit>, BapError> {
    let mut hits = Vec::new();
    for region in hit_records(Some(regions)) {
        let Some((group, db)) = region_database(region, requested) else {
            debug!(region = ?region.get("key"), "region outside requested databases");
            continue;
        };
        let (coverage, identity) = scores(region)?;
        hits.push(Hit {
            name: text(region, "name")
                .or_else(|| text(region, schema.name_field))
                .unwrap_or_else(|| "?unknown?".to_string()),
            group: group.to_string(),
            database: db.to_string(),
            query_id: text(region, "query_id").unwrap_or_default(),
            query_start: count(region.get("query_start_pos")),
            query_end: count(region.get("query_end_pos")),
            ref_acc: text(region, "ref_acc").unwrap_or_default(),
            ref_start: count(region.get("ref_start_pos")),
            ref_end: count(region.get("ref_end_pos")),
            alignment_length: count(region.get("alignment_length")),
            ref_length: count(region.get("ref_seq_length")),
            coverage,
            identity,
            quality: quality(coverage, identity),
            extra: extras(region, schema),
        });
    }
    Ok(hits)
}

fn region_database<'a>(
    region: &Map<String, Value>,
    requested: &'a GroupDatabases,
) -> Option<(&'a str, &'a str)> {
    let names: Vec<&str> = match region.get("ref_database") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(s)) => vec![s.as_str()],
        _ => Vec::new(),
    };
    names.into_iter().find_map(|name| {
        let db = name.rsplit_once(':').map_or(name, |(_, db)| db);
        requested.iter().find_map(|(group, dbs)| {
            dbs.iter()
                .find(|d| d.as_str() == db)
                .map(|d| (group.as_str(), d.as_str()))
        })
    })
}

fn scores(hit: &Map<String, Value>) -> Result<(f64, f64), BapError> {
    let coverage = number(hit.get("coverage"))
        .ok_or_else(|| BapError::Json(format!("hit lacks numeric coverage: {}", Value::Object(hit.clone()))))?;
    let identity = number(hit.get("identity"))
        .ok_or_else(|| BapError::Json(format!("hit lacks numeric identity: {}", Value::Object(hit.clone()))))?;
    Ok((coverage, identity))
}

fn extras(hit: &Map<String, Value>, schema: &HitSchema) -> Map<String, Value> {
    schema
        .extra_fields
        .iter()
        .filter_map(|field| hit.get(*field).map(|v| (field.to_string(), v.clone())))
        .collect()
}

fn text(hit: &Map<String, Value>, field: &str) -> Option<String> {
    match hit.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn span(value: Option<&Value>) -> (Option<u64>, Option<u64>) {
    let Some(s) = value.and_then(Value::as_str) else {
        return (None, None);
    };
    match s.split_once("..") {
        Some((start, end)) => (start.trim().parse().ok(), end.trim().parse().ok()),
        None => (s.trim().parse().ok(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_parses_ranges() {
        assert_eq!(
            span(Some(&Value::String("12..693".to_string()))),
            (Some(12), Some(693))
        );
        assert_eq!(span(None), (None, None));
    }

    #[test]
    fn region_database_strips_tool_prefix() {
        let mut requested = GroupDatabases::new();
        requested.insert(
            "Enterobacteriales".to_string(),
            vec!["enterobacteriales".to_string()],
        );
        let region = serde_json::json!({
            "ref_database": ["PlasmidFinder-2.1.6:enterobacteriales"]
        });
        let region = region.as_object().unwrap();
        assert_eq!(
            region_database(region, &requested),
            Some(("Enterobacteriales", "enterobacteriales"))
        );
    }
}
