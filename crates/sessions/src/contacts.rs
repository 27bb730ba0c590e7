use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use {fd_lock::RwLock, tracing::debug};

use crate::{
    contact::Contact,
    defaults,
    error::{Context, Error, Result},
};

/// Contact directory persisted as a JSON array in `contacts.json`.
pub struct ContactStore {
    path: PathBuf,
}

impl ContactStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at `<data_dir>/contacts.json`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("contacts.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the default directory if none exists yet. Returns `true` when
    /// it seeded.
    pub async fn ensure_seeded(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save(defaults::contacts()).await?;
        debug!(path = %self.path.display(), "seeded default contacts");
        Ok(true)
    }

    /// All contacts, seeding the defaults on first use.
    pub async fn load(&self) -> Result<Vec<Contact>> {
        self.ensure_seeded().await?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<Contact>> {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(serde_json::from_str(&raw)?)
        })
        .await?
    }

    /// Replace the directory with `contacts`.
    pub async fn save(&self, contacts: Vec<Contact>) -> Result<()> {
        let path = self.path.clone();
        let json = serde_json::to_string_pretty(&contacts)?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)?;
            let mut lock = RwLock::new(file);
            let mut guard = lock
                .write()
                .map_err(|e| Error::lock_failed(e.to_string()))?;
            guard.write_all(json.as_bytes())?;
            Ok(())
        })
        .await??;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Contact>> {
        Ok(self.load().await?.into_iter().find(|c| c.id == id))
    }

    /// Put `contact` at the top of the directory, replacing any contact
    /// with the same id.
    pub async fn insert_front(&self, contact: Contact) -> Result<()> {
        let mut contacts = self.load().await?;
        contacts.retain(|c| c.id != contact.id);
        contacts.insert(0, contact);
        self.save(contacts).await
    }

    /// Record the preview text shown for a contact.
    pub async fn touch_last_message(&self, id: &str, text: &str) -> Result<()> {
        let mut contacts = self.load().await?;
        let contact = contacts
            .iter_mut()
            .find(|c| c.id == id)
            .with_context(|| format!("unknown contact: {id}"))?;
        contact.last_message = Some(text.to_string());
        self.save(contacts).await
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::contact::ContactKind};

    fn temp_store() -> (ContactStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContactStore::in_data_dir(dir.path());
        (store, dir)
    }

    #[tokio::test]
    async fn load_seeds_defaults_once() {
        let (store, _dir) = temp_store();
        assert!(store.ensure_seeded().await.unwrap());
        assert!(!store.ensure_seeded().await.unwrap());

        let contacts = store.load().await.unwrap();
        assert_eq!(contacts.len(), 4);
        assert_eq!(contacts[3].kind, ContactKind::Channel);
    }

    #[tokio::test]
    async fn insert_front_prepends_and_replaces() {
        let (store, _dir) = temp_store();
        store
            .insert_front(Contact::direct("c3", "Iris", "Navigator."))
            .await
            .unwrap();
        let mut maria = store.get("c2").await.unwrap().unwrap();
        maria.bio = "Lead designer.".into();
        store.insert_front(maria).await.unwrap();

        let contacts = store.load().await.unwrap();
        assert_eq!(contacts.len(), 5);
        assert_eq!(contacts[0].bio, "Lead designer.");
        assert_eq!(contacts[1].id, "c3");
        assert_eq!(contacts.iter().filter(|c| c.id == "c2").count(), 1);
    }

    #[tokio::test]
    async fn touch_last_message_updates_preview() {
        let (store, _dir) = temp_store();
        store.touch_last_message("c1", "see you").await.unwrap();
        let c1 = store.get("c1").await.unwrap().unwrap();
        assert_eq!(c1.last_message.as_deref(), Some("see you"));

        let err = store.touch_last_message("zz", "x").await.unwrap_err();
        assert!(err.to_string().contains("unknown contact"));
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let (store, _dir) = temp_store();
        assert!(store.get("nope").await.unwrap().is_none());
    }
}
