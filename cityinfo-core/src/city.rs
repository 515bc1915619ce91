//! Stored city records and the store they live in.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Tourist rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    #[error("City not found: {0}")]
    NotFound(u64),

    #[error("City store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("City store is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Rating from 1 to 5 stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TouristRating(u8);

impl TouristRating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(stars: u8) -> Result<Self, StoreError> {
        if (Self::MIN..=Self::MAX).contains(&stars) {
            Ok(Self(stars))
        } else {
            Err(StoreError::InvalidRating(stars))
        }
    }

    pub fn stars(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for TouristRating {
    type Error = StoreError;

    fn try_from(stars: u8) -> Result<Self, Self::Error> {
        Self::new(stars)
    }
}

impl From<TouristRating> for u8 {
    fn from(rating: TouristRating) -> Self {
        rating.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: u64,
    pub name: String,
    pub state: String,
    pub country: String,
    pub tourist_rating: TouristRating,
    pub date_established: NaiveDate,
    pub estimated_population: u64,
}

/// A city that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCity {
    pub name: String,
    pub state: String,
    pub country: String,
    pub tourist_rating: TouristRating,
    pub date_established: NaiveDate,
    pub estimated_population: u64,
}

/// Fields that may change after creation. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CityUpdate {
    pub tourist_rating: Option<TouristRating>,
    pub date_established: Option<NaiveDate>,
    pub estimated_population: Option<u64>,
}

impl CityUpdate {
    pub fn is_empty(&self) -> bool {
        self.tourist_rating.is_none()
            && self.date_established.is_none()
            && self.estimated_population.is_none()
    }

    fn apply(&self, city: &mut City) {
        if let Some(rating) = self.tourist_rating {
            city.tourist_rating = rating;
        }
        if let Some(date) = self.date_established {
            city.date_established = date;
        }
        if let Some(population) = self.estimated_population {
            city.estimated_population = population;
        }
    }
}

pub trait CityStore {
    fn create(&self, city: NewCity) -> Result<City, StoreError>;

    fn list(&self) -> Result<Vec<City>, StoreError>;

    fn get(&self, id: u64) -> Result<Option<City>, StoreError>;

    fn update(&self, id: u64, update: CityUpdate) -> Result<City, StoreError>;

    /// Removes the city and returns what was stored.
    fn delete(&self, id: u64) -> Result<City, StoreError>;

    /// Cities whose name contains `query`, ignoring case.
    fn search_by_name(&self, query: &str) -> Result<Vec<City>, StoreError> {
        let needle = query.trim().to_lowercase();
        let cities = self.list()?;
        Ok(cities.into_iter().filter(|c| c.name.to_lowercase().contains(&needle)).collect())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    next_id: u64,
    cities: Vec<City>,
}

/// Keeps all cities in one JSON file. Ids start at 1 and are never reused.
///
/// Mutations hold an exclusive lock on `<file>.lock` and replace the file
/// by renaming a fully written temp file over it, so separate processes
/// sharing one store neither hand out the same id nor see a partial file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io { path: self.path.clone(), source }
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".lock");
        PathBuf::from(path)
    }

    /// Held until the returned file is dropped.
    fn lock(&self) -> Result<File, StoreError> {
        fs::create_dir_all(self.dir()).map_err(|e| self.io_error(e))?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())
            .map_err(|e| self.io_error(e))?;
        lock.lock().map_err(|e| self.io_error(e))?;
        Ok(lock)
    }

    /// Read-modify-write under the store lock. Nothing is written when `change` fails.
    fn modify<T>(
        &self,
        change: impl FnOnce(&mut StoreFile) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _lock = self.lock()?;

        let mut file = self.read()?;
        let out = change(&mut file)?;
        self.write(&file)?;
        Ok(out)
    }

    fn read(&self) -> Result<StoreFile, StoreError> {
        if !self.path.exists() {
            return Ok(StoreFile { next_id: 1, cities: Vec::new() });
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, file: &StoreFile) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(file)?;

        // Same directory, so the rename never crosses filesystems.
        let mut tmp = NamedTempFile::new_in(self.dir()).map_err(|e| self.io_error(e))?;
        tmp.write_all(&json).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }
}

impl CityStore for JsonFileStore {
    fn create(&self, city: NewCity) -> Result<City, StoreError> {
        let city = self.modify(|file| {
            let city = City {
                id: file.next_id,
                name: city.name,
                state: city.state,
                country: city.country,
                tourist_rating: city.tourist_rating,
                date_established: city.date_established,
                estimated_population: city.estimated_population,
            };
            file.next_id += 1;
            file.cities.push(city.clone());
            Ok(city)
        })?;

        tracing::debug!(id = city.id, name = %city.name, "City created");
        Ok(city)
    }

    fn list(&self) -> Result<Vec<City>, StoreError> {
        Ok(self.read()?.cities)
    }

    fn get(&self, id: u64) -> Result<Option<City>, StoreError> {
        Ok(self.read()?.cities.into_iter().find(|c| c.id == id))
    }

    fn update(&self, id: u64, update: CityUpdate) -> Result<City, StoreError> {
        let updated = self.modify(|file| {
            let city =
                file.cities.iter_mut().find(|c| c.id == id).ok_or(StoreError::NotFound(id))?;
            update.apply(city);
            Ok(city.clone())
        })?;

        tracing::debug!(id, "City updated");
        Ok(updated)
    }

    fn delete(&self, id: u64) -> Result<City, StoreError> {
        let removed = self.modify(|file| {
            let index =
                file.cities.iter().position(|c| c.id == id).ok_or(StoreError::NotFound(id))?;
            Ok(file.cities.remove(index))
        })?;

        tracing::debug!(id, "City deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = JsonFileStore::new(dir.path().join("nested").join("cities.json"));
        (dir, store)
    }

    fn new_city(name: &str, country: &str) -> NewCity {
        NewCity {
            name: name.into(),
            state: "State".into(),
            country: country.into(),
            tourist_rating: TouristRating::new(3).unwrap(),
            date_established: NaiveDate::from_ymd_opt(1800, 5, 17).unwrap(),
            estimated_population: 100_000,
        }
    }

    #[test]
    fn rating_outside_one_to_five_is_rejected() {
        assert!(matches!(TouristRating::new(0), Err(StoreError::InvalidRating(0))));
        assert!(matches!(TouristRating::new(6), Err(StoreError::InvalidRating(6))));
        assert_eq!(TouristRating::new(1).unwrap().stars(), 1);
        assert_eq!(TouristRating::new(5).unwrap().stars(), 5);
    }

    #[test]
    fn rating_is_validated_on_deserialize() {
        assert!(serde_json::from_str::<TouristRating>("9").is_err());
        assert_eq!(serde_json::from_str::<TouristRating>("2").unwrap().stars(), 2);
    }

    #[test]
    fn empty_store_lists_nothing() {
        let (_dir, store) = store();
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.get(1).unwrap(), None);
    }

    #[test]
    fn create_assigns_increasing_ids() {
        let (_dir, store) = store();

        let paris = store.create(new_city("Paris", "France")).unwrap();
        let lyon = store.create(new_city("Lyon", "France")).unwrap();

        assert_eq!(paris.id, 1);
        assert_eq!(lyon.id, 2);
        assert_eq!(store.list().unwrap(), vec![paris.clone(), lyon]);
        assert_eq!(store.get(1).unwrap(), Some(paris));
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let (_dir, store) = store();

        store.create(new_city("Paris", "France")).unwrap();
        let removed = store.delete(1).unwrap();
        let next = store.create(new_city("Lyon", "France")).unwrap();

        assert_eq!(removed.name, "Paris");
        assert_eq!(next.id, 2);
    }

    #[test]
    fn update_changes_only_given_fields() {
        let (_dir, store) = store();
        let created = store.create(new_city("Oslo", "Norway")).unwrap();

        let updated = store
            .update(
                created.id,
                CityUpdate { estimated_population: Some(709_000), ..Default::default() },
            )
            .unwrap();

        assert_eq!(updated.estimated_population, 709_000);
        assert_eq!(updated.tourist_rating, created.tourist_rating);
        assert_eq!(updated.name, "Oslo");
        assert_eq!(store.get(created.id).unwrap(), Some(updated));
    }

    #[test]
    fn missing_ids_are_not_found() {
        let (_dir, store) = store();

        assert!(matches!(store.update(42, CityUpdate::default()), Err(StoreError::NotFound(42))));
        assert!(matches!(store.delete(42), Err(StoreError::NotFound(42))));
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let (_dir, store) = store();
        store.create(new_city("San Francisco", "United States")).unwrap();
        store.create(new_city("San Diego", "United States")).unwrap();
        store.create(new_city("Boston", "United States")).unwrap();

        let names: Vec<_> =
            store.search_by_name("SAN ").unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["San Francisco", "San Diego"]);

        assert!(store.search_by_name("atlantis").unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ nope").unwrap();

        assert!(matches!(store.list(), Err(StoreError::Serde(_))));
    }

    #[test]
    fn concurrent_creates_get_distinct_ids() {
        let (_dir, store) = store();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                // A fresh handle per thread, like separate CLI runs.
                let store = JsonFileStore::new(store.path());
                std::thread::spawn(move || store.create(new_city(&format!("City {i}"), "X")).unwrap())
            })
            .collect();

        let mut ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap().id).collect();
        ids.sort_unstable();

        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
        assert_eq!(store.list().unwrap().len(), 8);
    }

    #[test]
    fn writes_leave_no_temp_files_behind() {
        let (_dir, store) = store();
        store.create(new_city("Paris", "France")).unwrap();
        store.delete(1).unwrap();

        let mut names: Vec<_> = fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();

        assert_eq!(names, ["cities.json", "cities.json.lock"]);
    }

    #[test]
    fn failed_mutation_keeps_the_stored_file() {
        let (_dir, store) = store();
        store.create(new_city("Paris", "France")).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        assert!(matches!(store.delete(99), Err(StoreError::NotFound(99))));

        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn stored_json_uses_camel_case() {
        let (_dir, store) = store();
        store.create(new_city("Paris", "France")).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"touristRating\": 3"));
        assert!(raw.contains("\"dateEstablished\": \"1800-05-17\""));
    }
}
