/// Join URL path segments with single slashes.
///
/// Each segment is trimmed of one leading and one trailing `/`; segments
/// that end up empty are dropped.
pub fn resolve_path<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .filter_map(|segment| {
            let segment = segment.as_ref();
            let segment = segment.strip_prefix('/').unwrap_or(segment);
            let segment = segment.strip_suffix('/').unwrap_or(segment);
            (!segment.is_empty()).then(|| segment.to_string())
        })
        .collect::<Vec<_>>()
        .join("/")
}
