use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

/// Reads a text file and returns its non-blank lines, trimmed.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub fn read_lines<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty())
		.map(str::to_owned)
		.collect())
}

/// Extracts the base filename without extension.
///
/// Examples:
/// - `"./data/news.bin"` → `"news"`
/// - `"news.bin"` → `"news"`
pub fn get_filename<P: AsRef<Path>>(input_path: P) -> io::Result<String> {
	let stem = input_path
		.as_ref()
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no filename"))?;

	Ok(stem.to_string_lossy().to_string())
}

/// Normalize a folder path.
///
/// - `"."` or `"./"` resolves to the current working directory
/// - Other paths are returned as-is (not canonicalized)
pub fn normalize_folder<P: AsRef<Path>>(input: P) -> PathBuf {
	let input = input.as_ref();
	if input == Path::new(".") || input == Path::new("./") {
		env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
	} else {
		input.to_path_buf()
	}
}

/// Lists all files with a given extension in a directory.
///
/// Returns paths of regular files directly inside `dir`, sorted.
pub fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<PathBuf>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			files.push(path);
		}
	}

	files.sort();
	Ok(files)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn read_lines_skips_blank_lines() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("headlines.txt");
		fs::write(&path, "First line\r\n\n   \n  Second line  \n").unwrap();

		assert_eq!(read_lines(&path).unwrap(), vec!["First line", "Second line"]);
	}

	#[test]
	fn filename_drops_extension() {
		assert_eq!(get_filename("./data/news.bin").unwrap(), "news");
		assert!(get_filename("").is_err());
	}

	#[test]
	fn list_files_filters_extension() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("b.bin"), b"").unwrap();
		fs::write(dir.path().join("a.bin"), b"").unwrap();
		fs::write(dir.path().join("notes.txt"), b"").unwrap();
		fs::create_dir(dir.path().join("c.bin")).unwrap();

		let names: Vec<String> = list_files(dir.path(), "bin")
			.unwrap()
			.iter()
			.map(|path| get_filename(path).unwrap())
			.collect();
		assert_eq!(names, vec!["a", "b"]);
	}
}
