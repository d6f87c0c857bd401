//! Save/load round trips and load failure modes.

use asgraph::io::Header;
use asgraph::schema::demo;
use asgraph::{Advisory, AttrValue, Factory, GraphError, Position, SchemaBuilder, StrTable};
use byteorder::{LittleEndian, WriteBytesExt};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn save(factory: &Factory) -> Vec<u8> {
    let mut bytes = Vec::new();
    factory.save(&mut bytes).unwrap();
    bytes
}

/// File tag and header for the demo schema.
fn header_bytes(js: &demo::JavaScript) -> Vec<u8> {
    let mut bytes = b"ASGB".to_vec();
    Header::for_schema(&js.schema).write_to(&mut bytes).unwrap();
    bytes
}

/// Everything up to the first node record: header, empty string table and
/// the given id range.
fn stream_prefix(js: &demo::JavaScript, range: u32) -> Vec<u8> {
    let mut bytes = header_bytes(js);
    StrTable::new(256).write_to(&mut bytes, |_, _| true).unwrap();
    bytes.write_u32::<LittleEndian>(range).unwrap();
    bytes
}

fn load_err(js: &demo::JavaScript, bytes: &[u8]) -> GraphError {
    let mut g = Factory::new(js.schema.clone());
    let err = g.load(&mut &bytes[..]).unwrap_err();
    assert!(g.is_empty());
    err
}

#[test]
fn test_return_of_identifier_round_trip() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let a = f.create(js.identifier).unwrap();
    f.set_str(a, js.name, "x").unwrap();
    let b = f.create(js.return_statement).unwrap();
    f.set_edge(b, js.return_statement_expression, a).unwrap();

    let bytes = save(&f);
    let mut g = Factory::new(js.schema.clone());
    g.load(&mut bytes.as_slice()).unwrap();

    let target = g.edge(b, js.return_statement_expression).unwrap();
    assert_eq!(target, a);
    assert_eq!(g.get(target).unwrap().kind(), js.identifier);
    assert_eq!(g.str_attr(target, js.name).unwrap(), "x");

    assert!(matches!(
        g.reverse_query(a, js.return_statement_expression),
        Err(GraphError::ReverseEdgesDisabled)
    ));
    g.enable_reverse_edges(None);
    let sources: Vec<_> = g
        .reverse_query(a, js.return_statement_expression)
        .unwrap()
        .collect();
    assert_eq!(sources, vec![b]);
}

#[test]
fn test_full_graph_round_trip() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let root = f.root().unwrap();
    let path = f.strings_mut().intern("src/app.js");
    f.set_position(root, Position::new(path, 1, 1, 40, 1)).unwrap();

    let var = f.create(js.variable_declaration).unwrap();
    f.set_str(var, js.name, "total").unwrap();
    f.set_attr(var, js.is_const, true).unwrap();
    let sum = f.create(js.binary_expression).unwrap();
    f.set_attr(sum, js.operator, AttrValue::Enum(3)).unwrap();
    let one = f.create(js.literal).unwrap();
    f.set_str(one, js.raw, "1").unwrap();
    f.set_attr(one, js.value, 1.0f64).unwrap();
    let ref_x = f.create(js.identifier).unwrap();
    f.set_str(ref_x, js.name, "x").unwrap();
    f.set_edge(sum, js.binary_expression_left, one).unwrap();
    f.set_edge(sum, js.binary_expression_right, ref_x).unwrap();
    f.set_edge(var, js.variable_declaration_init, sum).unwrap();
    f.set_edge(ref_x, js.identifier_refers_to, var).unwrap();

    let func = f.create(js.function).unwrap();
    f.add_edge(func, js.function_captures, var).unwrap();
    let note = f.create(js.comment).unwrap();
    f.set_str(note, js.text, "// sum").unwrap();
    f.add_edge(var, js.commentable_comments, note).unwrap();
    f.add_edge(func, js.commentable_comments, note).unwrap();
    f.add_edge(func, js.commentable_comments, note).unwrap();
    f.add_edge(root, js.program_body, var).unwrap();
    f.add_edge(root, js.program_body, func).unwrap();

    let bytes = save(&f);
    let mut g = Factory::new(js.schema.clone());
    g.load(&mut bytes.as_slice()).unwrap();

    assert_eq!(g.len(), f.len());
    for node in f.iter() {
        let loaded = g.get(node.id()).unwrap();
        assert_eq!(loaded.kind(), node.kind());
        assert_eq!(loaded.parent_edge(), node.parent_edge());
        assert_eq!(loaded.edge_slots(), node.edge_slots());
        assert_eq!(loaded.position(), node.position());
        for (x, y) in loaded.attrs().iter().zip(node.attrs()) {
            match (x, y) {
                (AttrValue::Str(kx), AttrValue::Str(ky)) => {
                    assert_eq!(g.strings().resolve(*kx), f.strings().resolve(*ky));
                }
                _ => assert_eq!(x, y),
            }
        }
    }
    assert_eq!(
        g.edge_targets(func, js.commentable_comments),
        vec![note, note]
    );
    assert_eq!(g.strings().resolve(path), "src/app.js");
}

#[test]
fn test_filtered_nodes_are_saved() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let ident = f.create(js.identifier).unwrap();
    f.set_filtered(ident, true).unwrap();
    let bytes = save(&f);
    assert!(f.is_filter_on());

    let mut g = Factory::new(js.schema.clone());
    g.load(&mut bytes.as_slice()).unwrap();
    assert!(g.exists(ident));
    assert!(!g.is_filtered(ident));
}

#[test]
fn test_truncated_stream_leaves_factory_empty() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let func = f.create(js.function).unwrap();
    f.set_str(func, js.name, "main").unwrap();
    let bytes = save(&f);

    for cut in [3, 10, bytes.len() / 2, bytes.len() - 1] {
        let mut g = Factory::new(js.schema.clone());
        let err = g.load(&mut &bytes[..cut]).unwrap_err();
        assert!(
            matches!(err, GraphError::TruncatedStream { .. }),
            "cut at {cut}: {err}"
        );
        assert!(g.is_empty());
        assert_eq!(g.root(), None);
    }
}

#[test]
fn test_version_mismatch() {
    let js = demo::javascript().unwrap();
    let f = Factory::new(js.schema.clone());
    let bytes = save(&f);

    let mut other = SchemaBuilder::new("JavaScriptLanguage", "2.0", "1.0");
    other.kind("Program", &[]);
    let mut g = Factory::new(Arc::new(other.build().unwrap()));
    let err = g.load(&mut bytes.as_slice()).unwrap_err();
    assert!(matches!(err, GraphError::VersionMismatch { .. }));
}

#[test]
fn test_binary_version_mismatch_still_loads() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let ident = f.create(js.identifier).unwrap();
    let bytes = save(&f);

    // Rewrite the header with a different binary version.
    let mut header = Header::for_schema(&js.schema);
    let original_len = {
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        buf.len()
    };
    header.binary_version = "1.1".to_string();
    let mut patched = bytes[..4].to_vec();
    header.write_to(&mut patched).unwrap();
    patched.extend_from_slice(&bytes[4 + original_len..]);

    let mut g = Factory::new(js.schema.clone());
    let advisories = g.load(&mut patched.as_slice()).unwrap();
    assert_eq!(
        advisories,
        vec![Advisory::BinaryVersionDiffers {
            expected: "1.0".to_string(),
            found: "1.1".to_string()
        }]
    );
    assert!(g.exists(ident));
}

#[test]
fn test_unknown_node_kind() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let retired = f.create(js.identifier).unwrap();
    f.destroy(retired).unwrap();
    let bytes = save(&f);

    // Replace the end marker with a record of an undeclared kind, using an id
    // inside the saved id range.
    let mut patched = bytes[..bytes.len() - 6].to_vec();
    patched.write_u32::<LittleEndian>(retired).unwrap();
    patched.write_u16::<LittleEndian>(999).unwrap();

    let mut g = Factory::new(js.schema.clone());
    let err = g.load(&mut patched.as_slice()).unwrap_err();
    assert!(matches!(err, GraphError::UnknownNodeKind { kind: 999 }));
    assert!(g.is_empty());
}

#[test]
fn test_out_of_order_ids_are_corrupt() {
    let js = demo::javascript().unwrap();
    let f = Factory::new(js.schema.clone());
    let bytes = save(&f);

    // Append a second root record reusing the id already read.
    let mut patched = bytes[..bytes.len() - 6].to_vec();
    patched.write_u32::<LittleEndian>(f.root().unwrap()).unwrap();
    patched.write_u16::<LittleEndian>(js.program).unwrap();

    let mut g = Factory::new(js.schema.clone());
    let err = g.load(&mut patched.as_slice()).unwrap_err();
    assert!(matches!(err, GraphError::Corrupt { .. }));
}

#[test]
fn test_path_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("module.jsi");
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let lit = f.create(js.literal).unwrap();
    f.set_attr(lit, js.value, -0.5f64).unwrap();
    f.save_to_path(&path).unwrap();

    let mut g = Factory::new(js.schema.clone());
    g.load_from_path(&path).unwrap();
    assert_eq!(g.attr(lit, js.value).unwrap(), AttrValue::Float(-0.5));
    assert!(g.load_from_path(dir.path().join("missing.jsi")).is_err());
}

#[test]
fn test_handcrafted_stream_loads() {
    let js = demo::javascript().unwrap();
    let mut bytes = stream_prefix(&js, 100);
    bytes.write_u32::<LittleEndian>(0).unwrap();
    bytes.write_u16::<LittleEndian>(0).unwrap();

    let mut g = Factory::new(js.schema.clone());
    g.load(&mut bytes.as_slice()).unwrap();
    assert!(g.is_empty());
    assert_eq!(g.next_id(), 100);
}

#[test]
fn test_record_id_outside_range_is_corrupt() {
    let js = demo::javascript().unwrap();
    let mut bytes = stream_prefix(&js, 101);
    bytes.write_u32::<LittleEndian>(0xFFFF_FFF0).unwrap();
    bytes.write_u16::<LittleEndian>(js.identifier).unwrap();

    let err = load_err(&js, &bytes);
    assert!(matches!(err, GraphError::Corrupt { .. }), "{err}");
}

#[test]
fn test_id_range_below_first_id_is_corrupt() {
    let js = demo::javascript().unwrap();
    let mut bytes = stream_prefix(&js, 7);
    bytes.write_u32::<LittleEndian>(0).unwrap();
    bytes.write_u16::<LittleEndian>(0).unwrap();

    let err = load_err(&js, &bytes);
    assert!(matches!(err, GraphError::Corrupt { .. }), "{err}");
}

#[test]
fn test_oversized_bucket_count_is_corrupt() {
    let js = demo::javascript().unwrap();
    for buckets in [0u32, 70_000, u32::MAX] {
        let mut bytes = header_bytes(&js);
        bytes.extend_from_slice(b"STRTBL");
        bytes.write_u32::<LittleEndian>(buckets).unwrap();

        let err = load_err(&js, &bytes);
        assert!(matches!(err, GraphError::Corrupt { .. }), "{buckets}: {err}");
    }
}

#[test]
fn test_oversized_string_length_is_corrupt() {
    let js = demo::javascript().unwrap();
    let mut bytes = header_bytes(&js);
    bytes.extend_from_slice(b"STRTBL");
    bytes.write_u32::<LittleEndian>(1).unwrap();
    bytes.write_u16::<LittleEndian>(1).unwrap();
    bytes.write_u32::<LittleEndian>(0x0001_0000).unwrap();
    bytes.write_u32::<LittleEndian>(0xFFFF_FFF0).unwrap();
    bytes.extend_from_slice(b"abc");

    let err = load_err(&js, &bytes);
    assert!(matches!(err, GraphError::Corrupt { .. }), "{err}");
}

#[test]
fn test_short_string_data_is_truncated() {
    let js = demo::javascript().unwrap();
    let mut bytes = header_bytes(&js);
    bytes.extend_from_slice(b"STRTBL");
    bytes.write_u32::<LittleEndian>(1).unwrap();
    bytes.write_u16::<LittleEndian>(1).unwrap();
    bytes.write_u32::<LittleEndian>(0x0001_0000).unwrap();
    bytes.write_u32::<LittleEndian>(10).unwrap();
    bytes.extend_from_slice(b"abc");

    let err = load_err(&js, &bytes);
    assert!(matches!(err, GraphError::TruncatedStream { .. }), "{err}");
}

#[test]
fn test_destroyed_ids_stay_retired_after_reload() {
    let js = demo::javascript().unwrap();
    let mut f = Factory::new(js.schema.clone());
    let kept = f.create(js.identifier).unwrap();
    let last = f.create(js.identifier).unwrap();
    f.destroy(last).unwrap();
    let bytes = save(&f);

    let mut g = Factory::new(js.schema.clone());
    g.load(&mut bytes.as_slice()).unwrap();
    assert_eq!(g.next_id(), f.next_id());
    assert!(g.exists(kept));
    assert!(!g.exists(last));
    assert_eq!(g.create(js.identifier).unwrap(), last + 1);

    f.load(&mut bytes.as_slice()).unwrap();
    assert_eq!(f.create(js.identifier).unwrap(), last + 1);
}
