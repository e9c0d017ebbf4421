use docbench_common::{Document, FROM_FIELD, KEY_FIELD, TO_FIELD};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};

pub const FIELD_SIMPLE: &str = "simple";
pub const FIELD_LARGE: &str = "large";
pub const FIELD_ARRAY: &str = "array";
pub const FIELD_OBJECT: &str = "object";

/// Key of the vertex every generated edge points from and to.
pub const DUMMY_VERTEX_KEY: &str = "dummy";

/// Field counts and sizes of generated documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadShape {
    pub num_simple: usize,
    pub simple_size: usize,
    pub num_large: usize,
    pub large_size: usize,
    pub num_arrays: usize,
    pub array_size: usize,
    pub num_objects: usize,
    pub nesting_depth: usize,
}

impl Default for PayloadShape {
    fn default() -> Self {
        Self {
            num_simple: 5,
            simple_size: 20,
            num_large: 0,
            large_size: 100,
            num_arrays: 0,
            array_size: 10,
            num_objects: 0,
            nesting_depth: 1,
        }
    }
}

/// Generates document payloads for one worker.
///
/// The random content is produced once per batch slot; every call to
/// [`create`](Self::create) only stamps fresh keys onto the cached batch.
pub struct DocumentCreator {
    cache: Vec<Document>,
}

impl DocumentCreator {
    pub fn new(shape: &PayloadShape, batch_size: usize) -> Self {
        Self::with_rng(shape, batch_size, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng>(shape: &PayloadShape, batch_size: usize, rng: &mut R) -> Self {
        let cache = (0..batch_size).map(|_| template(shape, rng)).collect();
        Self { cache }
    }

    /// Stamp `keys` onto the cached batch. Extra cache slots beyond `keys.len()` are left out.
    pub fn create(&mut self, keys: &[String]) -> &[Document] {
        for (doc, key) in self.cache.iter_mut().zip(keys) {
            doc.insert(KEY_FIELD.to_string(), Value::String(key.clone()));
        }
        self.documents(keys.len())
    }

    /// Like [`create`](Self::create), with `_from` and `_to` set to the dummy vertex of `vertex_collection`.
    pub fn create_edges(&mut self, keys: &[String], vertex_collection: &str) -> &[Document] {
        let handle = Value::String(format!("{}/{}", vertex_collection, DUMMY_VERTEX_KEY));
        for (doc, key) in self.cache.iter_mut().zip(keys) {
            doc.insert(KEY_FIELD.to_string(), Value::String(key.clone()));
            doc.insert(FROM_FIELD.to_string(), handle.clone());
            doc.insert(TO_FIELD.to_string(), handle.clone());
        }
        self.documents(keys.len())
    }

    /// The first `n` documents of the most recently stamped batch.
    pub fn documents(&self, n: usize) -> &[Document] {
        &self.cache[..n.min(self.cache.len())]
    }
}

fn random_string<R: Rng>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

fn template<R: Rng>(shape: &PayloadShape, rng: &mut R) -> Document {
    let mut doc = Map::new();
    for i in 0..shape.num_simple {
        doc.insert(format!("{}{}", FIELD_SIMPLE, i), Value::String(random_string(rng, shape.simple_size)));
    }
    for i in 0..shape.num_large {
        doc.insert(format!("{}{}", FIELD_LARGE, i), Value::String(random_string(rng, shape.large_size)));
    }
    for i in 0..shape.num_arrays {
        let items = (0..shape.array_size)
            .map(|_| Value::String(random_string(rng, shape.simple_size)))
            .collect();
        doc.insert(format!("{}{}", FIELD_ARRAY, i), Value::Array(items));
    }
    for i in 0..shape.num_objects {
        doc.insert(format!("{}{}", FIELD_OBJECT, i), nested(shape, shape.nesting_depth.max(1), rng));
    }
    doc
}

fn nested<R: Rng>(shape: &PayloadShape, depth: usize, rng: &mut R) -> Value {
    let mut object = Map::new();
    object.insert("value".to_string(), Value::String(random_string(rng, shape.simple_size)));
    if depth > 1 {
        object.insert("nested".to_string(), nested(shape, depth - 1, rng));
    }
    Value::Object(object)
}
