use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::config::RuntimeConfig;
use crate::data::basis::Basis;
use crate::error::{Error, ErrorKind, ErrorLog};
use crate::resource::blob::glb::GlbContainer;
use crate::resource::blob::{open_document, BlobSource, MemoryBlobSource};
use crate::resource::cache::GltfCache;
use crate::resource::gltf::extension::ExtensionRegistry;
use crate::resource::gltf::loader::blob::BlobGltfLoader;
use crate::resource::gltf::loader::GltfLoader;
use crate::resource::json::{self, JsonValueExt, PathItem};

pub mod file;

/// A parsed glTF document plus everything decoded from it so far.
///
/// The JSON and the buffers never change after ingest. Decoded objects are shared through the
/// per-document cache until `clear_cache` releases them.
pub struct GltfAsset {
    root: Arc<Value>,
    loader: Box<dyn GltfLoader>,
    config: RuntimeConfig,
    basis: Basis,
    cache: GltfCache,
    errors: ErrorLog,
    extensions: ExtensionRegistry,
    disposed: Arc<AtomicBool>,
}

impl GltfAsset {
    /// Loads a `.gltf`, `.glb`, gzip or zip payload held in memory.
    ///
    /// Relative URIs only resolve when `config.base_directory` is set.
    pub fn load_from_bytes(bytes: Vec<u8>, config: RuntimeConfig) -> Result<Self> {
        let source = MemoryBlobSource {
            base_directory: config.base_directory.clone(),
        };
        Self::load_from_source(bytes, config, Box::new(source))
    }

    pub fn load_from_string(json: &str, config: RuntimeConfig) -> Result<Self> {
        Self::load_from_bytes(json.as_bytes().to_vec(), config)
    }

    pub(crate) fn load_from_source(
        bytes: Vec<u8>,
        config: RuntimeConfig,
        source: Box<dyn BlobSource>,
    ) -> Result<Self> {
        let (container, source) = open_document(bytes, &config, source)?;
        Self::from_container(container, config, source)
    }

    fn from_container(
        container: GlbContainer,
        config: RuntimeConfig,
        source: Box<dyn BlobSource>,
    ) -> Result<Self> {
        let root: Value = match serde_json::from_slice(&container.json) {
            Ok(root) => root,
            Err(error) => {
                return Err(Error::new(
                    ErrorKind::MalformedJson,
                    format!("Unable to parse the glTF JSON: {error}"),
                )
                .into())
            }
        };

        if !root.is_object() {
            return Err(Error::new(
                ErrorKind::MalformedJson,
                String::from("The glTF root is not a JSON object"),
            )
            .into());
        }

        match json::get_string_from_path(&root, &PathItem::parse_path("asset/version")) {
            Some(version) if !version.starts_with('2') => {
                log::warn!("Loading a glTF document that declares version {version}")
            }
            Some(_) => {}
            None => log::warn!("The glTF document has no asset.version"),
        }

        let extensions = ExtensionRegistry::new(&config.additional_supported_extensions);
        extensions.check_required(&root)?;

        let basis = config.basis()?;
        let root = Arc::new(root);
        let loader = BlobGltfLoader::new(
            root.clone(),
            source,
            container.binary_chunk,
            config.allow_external_files,
        );

        log::debug!(
            "Loaded glTF document: {} nodes, {} meshes, {} animations",
            json::root_len(&root, "nodes"),
            json::root_len(&root, "meshes"),
            json::root_len(&root, "animations")
        );

        Ok(Self {
            root,
            loader: Box::new(loader),
            config,
            basis,
            cache: GltfCache::default(),
            errors: ErrorLog::default(),
            extensions,
            disposed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn loader(&self) -> &dyn GltfLoader {
        self.loader.as_ref()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn basis(&self) -> &Basis {
        &self.basis
    }

    pub(crate) fn cache(&self) -> &GltfCache {
        &self.cache
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn get_errors(&self) -> Vec<String> {
        self.errors.entries()
    }

    pub fn clear_errors(&self) {
        self.errors.clear();
    }

    pub fn add_error(&self, context: &str, message: impl std::fmt::Display) {
        self.errors.add(context, message);
    }

    /// Records a failed public operation in the error log and passes the result through.
    pub(crate) fn report<T>(&self, context: &str, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            self.errors.add(context, format!("{error:#}"));
        }
        result
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn disposed_flag(&self) -> Arc<AtomicBool> {
        self.disposed.clone()
    }

    /// Releases every decoded object and marks the document disposed.
    ///
    /// Pending async continuations drop their results; synchronous loads keep working and
    /// repopulate the caches. Calling this again is harmless.
    pub fn clear_cache(&self) {
        self.disposed.store(true, Ordering::Release);
        self.cache.clear();
        self.loader.clear_buffers();
    }

    pub fn get_json_from_path(&self, steps: &[PathItem]) -> Option<&Value> {
        json::get_from_path(&self.root, steps)
    }

    pub fn get_string_from_path(&self, steps: &[PathItem]) -> Option<&str> {
        json::get_string_from_path(&self.root, steps)
    }

    pub fn get_number_from_path(&self, steps: &[PathItem]) -> Option<f64> {
        json::get_number_from_path(&self.root, steps)
    }

    pub fn get_bool_from_path(&self, steps: &[PathItem]) -> Option<bool> {
        json::get_bool_from_path(&self.root, steps)
    }

    pub fn get_array_size_from_path(&self, steps: &[PathItem]) -> Option<usize> {
        json::get_array_size_from_path(&self.root, steps)
    }

    pub fn get_object_keys_from_path(&self, steps: &[PathItem]) -> Option<Vec<String>> {
        json::get_object_keys_from_path(&self.root, steps)
    }

    /// `extras` of `root[collection][index]`, e.g. `("meshes", 0)`.
    pub fn get_extras(&self, collection: &str, index: usize) -> Option<&Value> {
        json::root_item(&self.root, collection, index)
            .ok()?
            .get("extras")
    }

    /// Bytes behind an object carrying either a `uri` or a `bufferView` (images, audio clips).
    pub(crate) fn load_object_bytes(&self, object: &Value) -> Result<Vec<u8>> {
        if let Some(view_index) = object.get_index("bufferView") {
            return Ok(self.loader.load_buffer_view(view_index)?.bytes().to_vec());
        }

        match object.get_string("uri") {
            Some(uri) => self.loader.load_uri(uri),
            None => Err(Error::new(
                ErrorKind::MissingSource,
                String::from("The object has neither a uri nor a bufferView"),
            )
            .into()),
        }
    }

    pub fn dump_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self.root.as_ref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind_of;

    #[test]
    fn rejects_invalid_json() {
        let error = GltfAsset::load_from_string("{not json", RuntimeConfig::default())
            .err()
            .unwrap();
        assert_eq!(kind_of(&error), Some(ErrorKind::MalformedJson));
    }

    #[test]
    fn rejects_non_object_root() {
        let error = GltfAsset::load_from_string("[1, 2]", RuntimeConfig::default())
            .err()
            .unwrap();
        assert_eq!(kind_of(&error), Some(ErrorKind::MalformedJson));
    }

    #[test]
    fn required_extensions_are_fatal() {
        let error = GltfAsset::load_from_string(
            r#"{"asset": {"version": "2.0"}, "extensionsRequired": ["KHR_unknown"]}"#,
            RuntimeConfig::default(),
        )
        .err()
        .unwrap();

        assert_eq!(kind_of(&error), Some(ErrorKind::UnsupportedRequiredExtension));
        assert!(error.to_string().contains("UnsupportedRequiredExtension: KHR_unknown"));
    }

    #[test]
    fn additional_extensions_are_accepted() {
        let config = RuntimeConfig {
            additional_supported_extensions: vec![String::from("KHR_unknown")],
            ..Default::default()
        };
        assert!(GltfAsset::load_from_string(
            r#"{"asset": {"version": "2.0"}, "extensionsRequired": ["KHR_unknown"]}"#,
            config,
        )
        .is_ok());
    }

    #[test]
    fn report_appends_context() {
        let json = r#"{"asset": {"version": "2.0"}}"#;
        let asset = GltfAsset::load_from_string(json, RuntimeConfig::default()).unwrap();

        let result: Result<()> =
            Err(Error::new(ErrorKind::IndexOutOfRange, String::from("mesh 4")).into());
        assert!(asset.report("LoadStaticMesh()", result).is_err());

        assert_eq!(
            asset.get_errors(),
            vec!["LoadStaticMesh(): IndexOutOfRange: mesh 4"]
        );
        asset.clear_errors();
        assert!(asset.get_errors().is_empty());
    }

    #[test]
    fn path_lookups_and_dump() {
        let asset = GltfAsset::load_from_string(
            r#"{"asset": {"version": "2.0"}, "meshes": [{"name": "box", "extras": {"lod": 2}}]}"#,
            RuntimeConfig::default(),
        )
        .unwrap();

        assert_eq!(
            asset.get_string_from_path(&PathItem::parse_path("meshes/0/name")),
            Some("box")
        );
        assert_eq!(
            asset.get_extras("meshes", 0).and_then(|extras| extras.get("lod")),
            Some(&Value::from(2))
        );

        let reloaded =
            GltfAsset::load_from_string(&asset.dump_json().unwrap(), RuntimeConfig::default())
                .unwrap();
        assert_eq!(reloaded.root(), asset.root());
    }

    #[test]
    fn clear_cache_marks_disposed() {
        let json = r#"{"asset": {"version": "2.0"}}"#;
        let asset = GltfAsset::load_from_string(json, RuntimeConfig::default()).unwrap();
        assert!(!asset.is_disposed());

        asset.clear_cache();
        asset.clear_cache();
        assert!(asset.is_disposed());
    }
}
