use docbench_common::{document_key, FROM_FIELD, TO_FIELD};
use docbench_load_test::document::{DocumentCreator, PayloadShape};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_default_shape() {
    let mut creator = DocumentCreator::new(&PayloadShape::default(), 1);
    let docs = creator.create(&keys(&["k"]));
    assert_eq!(docs.len(), 1);

    let doc = &docs[0];
    assert_eq!(document_key(doc), Some("k"));
    assert_eq!(doc.len(), 6);
    for i in 0..5 {
        let value = doc[&format!("simple{}", i)].as_str().unwrap();
        assert_eq!(value.len(), 20);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}

#[test]
fn test_all_field_families() {
    let shape = PayloadShape {
        num_simple: 1,
        simple_size: 4,
        num_large: 2,
        large_size: 50,
        num_arrays: 1,
        array_size: 3,
        num_objects: 1,
        nesting_depth: 3,
    };
    let mut rng = StdRng::seed_from_u64(7);
    let mut creator = DocumentCreator::with_rng(&shape, 2, &mut rng);
    let docs = creator.create(&keys(&["a", "b"]));
    let doc = &docs[1];

    assert_eq!(document_key(doc), Some("b"));
    assert_eq!(doc["large1"].as_str().unwrap().len(), 50);
    let array = doc["array0"].as_array().unwrap();
    assert_eq!(array.len(), 3);
    assert!(array.iter().all(|v| v.as_str().map(str::len) == Some(4)));

    let mut depth = 0;
    let mut current = &doc["object0"];
    while let Value::Object(object) = current {
        depth += 1;
        assert_eq!(object["value"].as_str().unwrap().len(), 4);
        match object.get("nested") {
            Some(child) => current = child,
            None => break,
        }
    }
    assert_eq!(depth, 3);
}

#[test]
fn test_payload_reused_across_batches() {
    let mut creator = DocumentCreator::new(&PayloadShape::default(), 2);
    let first = creator.create(&keys(&["a", "b"])).to_vec();
    let second = creator.create(&keys(&["c", "d"])).to_vec();

    assert_eq!(document_key(&second[0]), Some("c"));
    assert_eq!(first[0]["simple0"], second[0]["simple0"]);
    assert_ne!(first[0]["simple0"], first[1]["simple0"]);
}

#[test]
fn test_short_key_batch() {
    let mut creator = DocumentCreator::new(&PayloadShape::default(), 3);
    assert_eq!(creator.create(&keys(&["only"])).len(), 1);
    assert_eq!(creator.documents(10).len(), 3);
}

#[test]
fn test_edges_point_at_dummy_vertex() {
    let mut creator = DocumentCreator::new(&PayloadShape::default(), 1);
    let edges = creator.create_edges(&keys(&["e1"]), "Vertices");
    assert_eq!(edges[0][FROM_FIELD], "Vertices/dummy");
    assert_eq!(edges[0][TO_FIELD], "Vertices/dummy");
    assert_eq!(document_key(&edges[0]), Some("e1"));
}
