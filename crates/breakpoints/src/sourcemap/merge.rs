use super::{Mapping, OriginalLocation, SourceMap};

/// Combine two maps describing consecutive transformations.
///
/// `upstream` maps file B back to file A, `downstream` maps file C back to
/// file B. The result maps C straight to A. Downstream mappings whose
/// position in B has no counterpart in A are dropped. The sources,
/// contents, `file` and `sourceRoot` of the result come from `upstream`.
pub fn merge(upstream: &SourceMap, downstream: &SourceMap) -> eyre::Result<SourceMap> {
    let upstream_mappings = upstream.decoded_mappings()?;
    let mut names: Vec<String> = Vec::new();
    let mut merged = Vec::new();

    for mapping in downstream.decoded_mappings()? {
        let Some(original) = mapping.original else {
            continue;
        };
        let Some(traced) =
            upstream.original_position_in(&upstream_mappings, original.line, original.column)
        else {
            continue;
        };
        let Some(source) = upstream.sources.iter().position(|s| *s == traced.source) else {
            continue;
        };

        let name = traced.name.map(|name| {
            match names.iter().position(|n| *n == name) {
                Some(index) => index,
                None => {
                    names.push(name);
                    names.len() - 1
                }
            }
        });

        merged.push(Mapping {
            generated_line: mapping.generated_line,
            generated_column: mapping.generated_column,
            original: Some(OriginalLocation {
                source,
                line: traced.line,
                column: traced.column,
                name,
            }),
        });
    }

    let mut map = SourceMap::from_mappings(
        upstream.file.clone(),
        upstream.sources.clone(),
        names,
        &merged,
    );
    map.source_root = upstream.source_root.clone();
    map.sources_content = upstream.sources_content.clone();
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourcemap::SourceMapBuilder;

    #[test]
    fn traces_through_both_maps() {
        // transpiled.brs lines 1..3 come from lines 10, 20 and 30 of app.bs
        let mut upstream = SourceMapBuilder::new();
        upstream.add_mapped("a\n", "app.bs", 10, 0);
        upstream.add_mapped("b\n", "app.bs", 20, 0);
        upstream.add_mapped("c", "app.bs", 30, 0);
        let (_, upstream) = upstream.into_code_and_map(Some("transpiled.brs".to_string()));

        // a STOP injected in front of line 2 of transpiled.brs
        let mut downstream = SourceMapBuilder::new();
        downstream.add_mapped("a\n", "transpiled.brs", 1, 0);
        downstream.add_mapped("STOP", "transpiled.brs", 2, 0);
        downstream.add_unmapped("\n");
        downstream.add_mapped("b\n", "transpiled.brs", 2, 0);
        downstream.add_mapped("c", "transpiled.brs", 3, 0);
        let (_, downstream) = downstream.into_code_and_map(None);

        let merged = merge(&upstream, &downstream).unwrap();
        assert_eq!(merged.sources, vec!["app.bs".to_string()]);
        assert_eq!(merged.file.as_deref(), Some("transpiled.brs"));

        let line = |generated| {
            merged
                .original_position_for(generated, 0)
                .unwrap()
                .map(|p| p.line)
        };
        assert_eq!(line(1), Some(10));
        assert_eq!(line(2), Some(20));
        assert_eq!(line(3), Some(20));
        assert_eq!(line(4), Some(30));
    }

    #[test]
    fn drops_untraceable_mappings() {
        let mut upstream = SourceMapBuilder::new();
        upstream.add_unmapped("generated header\n");
        upstream.add_mapped("a", "app.bs", 1, 0);
        let (_, upstream) = upstream.into_code_and_map(None);

        let mut downstream = SourceMapBuilder::new();
        downstream.add_mapped("generated header\n", "out.brs", 1, 0);
        downstream.add_mapped("a", "out.brs", 2, 0);
        let (_, downstream) = downstream.into_code_and_map(None);

        let merged = merge(&upstream, &downstream).unwrap();
        assert!(merged.original_position_for(1, 0).unwrap().is_none());
        assert_eq!(
            merged.original_position_for(2, 0).unwrap().map(|p| p.line),
            Some(1)
        );
    }
}
