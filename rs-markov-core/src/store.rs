use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::error::{MarkovError, Result};
use crate::io::{get_filename, list_files, normalize_folder};
use crate::model::markov_model::MarkovModel;
use crate::model::strategy::Strategy;
use crate::record::TrainedLines;

/// Extension of snapshot files written by [`FolderStore`].
pub const SNAPSHOT_EXTENSION: &str = "bin";

/// Extension of the trained-lines record kept next to each snapshot.
pub const RECORD_EXTENSION: &str = "lines";

/// Keeps snapshot bytes under arbitrary model names.
///
/// A store never interprets the bytes: `load` returns exactly what `save`
/// was given.
pub trait SnapshotStore {
	/// Returns the bytes stored under `name`, or `None` if nothing is.
	fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;

	/// Stores `bytes` under `name`, replacing any previous value.
	fn save(&self, name: &str, bytes: &[u8]) -> Result<()>;

	/// Deletes `name`. Returns `false` if it did not exist.
	fn remove(&self, name: &str) -> Result<bool>;

	/// Names currently stored, sorted.
	fn names(&self) -> Result<Vec<String>>;

	/// Loads and upgrades the model stored under `name`.
	fn load_model(&self, name: &str) -> Result<Option<MarkovModel>> {
		self.load(name)?.map(|bytes| MarkovModel::from_bytes(&bytes)).transpose()
	}

	fn save_model(&self, name: &str, model: &MarkovModel) -> Result<()> {
		self.save(name, &model.to_bytes()?)
	}

	/// Loads the model stored under `name`, or creates an empty one with the
	/// given settings and stores it right away.
	///
	/// `order` and `strategy` are ignored when the model already exists.
	fn load_or_create(&self, name: &str, order: usize, strategy: Strategy) -> Result<MarkovModel> {
		if let Some(model) = self.load_model(name)? {
			return Ok(model);
		}

		info!("creating model '{name}' (order {order}, {strategy} strategy)");
		let model = MarkovModel::new(order, strategy);
		self.save_model(name, &model)?;
		Ok(model)
	}
}

/// Stores each snapshot as `<folder>/<name>.bin`, and the model's
/// [`TrainedLines`] record as `<folder>/<name>.lines`.
///
/// Writes go through a temporary file in the same folder and are renamed into
/// place, so a reader never sees a partial snapshot.
#[derive(Debug, Clone)]
pub struct FolderStore {
	folder: PathBuf,
}

impl FolderStore {
	/// Opens (and creates if needed) a store rooted at `folder`.
	pub fn new<P: AsRef<Path>>(folder: P) -> Result<Self> {
		let folder = normalize_folder(folder);
		fs::create_dir_all(&folder)?;
		Ok(Self { folder })
	}

	pub fn folder(&self) -> &Path {
		&self.folder
	}

	/// Maps a model name to its file path with the given extension.
	///
	/// Names must be non-empty and may only contain ASCII letters, digits,
	/// `-` and `_`, so they can never escape the folder.
	fn path_for(&self, name: &str, extension: &str) -> Result<PathBuf> {
		let valid = !name.is_empty()
			&& name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
		if !valid {
			return Err(MarkovError::InvalidName(name.to_owned()));
		}

		let mut path = self.folder.join(name);
		path.set_extension(extension);
		Ok(path)
	}

	/// Atomically replaces `path` with `bytes`.
	fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
		let mut file = NamedTempFile::new_in(&self.folder)?;
		file.write_all(bytes)?;
		file.persist(path).map_err(io::Error::from)?;
		debug!("saved {} bytes to {}", bytes.len(), path.display());
		Ok(())
	}

	/// Loads the trained-lines record of `name`, empty if none was saved.
	pub fn load_record(&self, name: &str) -> Result<TrainedLines> {
		let path = self.path_for(name, RECORD_EXTENSION)?;
		match fs::read(&path) {
			Ok(bytes) => TrainedLines::from_bytes(&bytes),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(TrainedLines::new()),
			Err(e) => Err(e.into()),
		}
	}

	pub fn save_record(&self, name: &str, record: &TrainedLines) -> Result<()> {
		let path = self.path_for(name, RECORD_EXTENSION)?;
		self.write_atomic(&path, &record.to_bytes()?)
	}
}

impl SnapshotStore for FolderStore {
	fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
		let path = self.path_for(name, SNAPSHOT_EXTENSION)?;
		match fs::read(&path) {
			Ok(bytes) => {
				debug!("loaded {} bytes from {}", bytes.len(), path.display());
				Ok(Some(bytes))
			}
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
		let path = self.path_for(name, SNAPSHOT_EXTENSION)?;
		self.write_atomic(&path, bytes)
	}

	/// Also deletes the model's trained-lines record.
	fn remove(&self, name: &str) -> Result<bool> {
		match fs::remove_file(self.path_for(name, RECORD_EXTENSION)?) {
			Ok(()) => {}
			Err(e) if e.kind() == io::ErrorKind::NotFound => {}
			Err(e) => return Err(e.into()),
		}

		let path = self.path_for(name, SNAPSHOT_EXTENSION)?;
		match fs::remove_file(&path) {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e.into()),
		}
	}

	fn names(&self) -> Result<Vec<String>> {
		list_files(&self.folder, SNAPSHOT_EXTENSION)?
			.iter()
			.map(|path| get_filename(path).map_err(MarkovError::from))
			.collect()
	}
}
