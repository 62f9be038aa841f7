//! Listing evaluation shared by the storage engines.

use locals3_model::{BucketQuery, BucketQueryResult, ObjectSummary};

/// Apply marker, prefix, delimiter and max-keys to summaries sorted by key.
///
/// Objects and common prefixes both count towards `max_keys`. When the page
/// is cut short, `next_marker` is the last key or prefix emitted.
pub fn evaluate(
    bucket: &str,
    sorted: impl IntoIterator<Item = ObjectSummary>,
    query: &BucketQuery,
) -> BucketQueryResult {
    let prefix = query.prefix.as_deref().unwrap_or("");
    let marker = query.marker.as_deref().unwrap_or("");
    let delimiter = query.delimiter.as_deref().filter(|d| !d.is_empty());

    let mut objects = Vec::new();
    let mut common_prefixes: Vec<String> = Vec::new();
    let mut last_emitted: Option<String> = None;
    let mut is_truncated = false;

    for summary in sorted {
        if !marker.is_empty() && summary.key.as_str() <= marker {
            continue;
        }
        if !summary.key.starts_with(prefix) {
            continue;
        }

        let rolled_up = delimiter.and_then(|d| {
            let rest = &summary.key[prefix.len()..];
            rest.find(d)
                .map(|pos| format!("{prefix}{}{d}", &rest[..pos]))
        });

        if let Some(common) = rolled_up {
            // Keys under the marker's own prefix were returned on a previous page.
            if common == marker || common_prefixes.last() == Some(&common) {
                continue;
            }
            if objects.len() + common_prefixes.len() >= query.max_keys {
                is_truncated = true;
                break;
            }
            last_emitted = Some(common.clone());
            common_prefixes.push(common);
            continue;
        }

        if objects.len() + common_prefixes.len() >= query.max_keys {
            is_truncated = true;
            break;
        }
        last_emitted = Some(summary.key.clone());
        objects.push(summary);
    }

    BucketQueryResult {
        bucket: bucket.to_owned(),
        query: query.clone(),
        objects,
        common_prefixes,
        is_truncated,
        next_marker: if is_truncated { last_emitted } else { None },
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn summaries(keys: &[&str]) -> Vec<ObjectSummary> {
        keys.iter()
            .map(|k| ObjectSummary {
                key: (*k).to_owned(),
                last_modified: Utc::now(),
                md5_hex: String::new(),
                size: 0,
            })
            .collect()
    }

    fn keys(result: &BucketQueryResult) -> Vec<&str> {
        result.objects.iter().map(|o| o.key.as_str()).collect()
    }

    #[test]
    fn test_should_filter_by_prefix() {
        let result = evaluate(
            "b",
            summaries(&["a/1", "a/2", "b/1"]),
            &BucketQuery {
                prefix: Some("a/".to_owned()),
                ..BucketQuery::default()
            },
        );
        assert_eq!(keys(&result), vec!["a/1", "a/2"]);
        assert!(!result.is_truncated);
    }

    #[test]
    fn test_should_roll_up_common_prefixes() {
        let result = evaluate(
            "b",
            summaries(&["photos/2023/a.jpg", "photos/2024/b.jpg", "photos/c.jpg", "z.txt"]),
            &BucketQuery {
                prefix: Some("photos/".to_owned()),
                delimiter: Some("/".to_owned()),
                ..BucketQuery::default()
            },
        );
        assert_eq!(keys(&result), vec!["photos/c.jpg"]);
        assert_eq!(
            result.common_prefixes,
            vec!["photos/2023/".to_owned(), "photos/2024/".to_owned()]
        );
    }

    #[test]
    fn test_should_truncate_and_resume_from_marker() {
        let all = summaries(&["a", "b", "c", "d"]);
        let first = evaluate(
            "b",
            all.clone(),
            &BucketQuery {
                max_keys: 2,
                ..BucketQuery::default()
            },
        );
        assert_eq!(keys(&first), vec!["a", "b"]);
        assert!(first.is_truncated);
        assert_eq!(first.next_marker.as_deref(), Some("b"));

        let second = evaluate(
            "b",
            all,
            &BucketQuery {
                max_keys: 2,
                marker: first.next_marker.clone(),
                ..BucketQuery::default()
            },
        );
        assert_eq!(keys(&second), vec!["c", "d"]);
        assert!(!second.is_truncated);
        assert_eq!(second.next_marker, None);
    }

    #[test]
    fn test_should_skip_prefix_named_by_marker() {
        let result = evaluate(
            "b",
            summaries(&["a/1", "a/2", "b/1"]),
            &BucketQuery {
                marker: Some("a/".to_owned()),
                delimiter: Some("/".to_owned()),
                ..BucketQuery::default()
            },
        );
        assert_eq!(result.common_prefixes, vec!["b/".to_owned()]);
    }
}
