use tokio::io::{AsyncRead, AsyncWrite};
use tracing::warn;

use crate::models::DirectoryEntry;
use crate::paths;
use crate::services::webdav::WebDavClient;

/// Connection lifecycle of one server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Receives human-readable status strings and state transitions from the
/// session. Presentation layers implement this; the session never talks to
/// a UI directly.
pub trait StatusSink {
    fn status(&mut self, message: &str);

    fn state_changed(&mut self, _state: ConnectionState) {}
}

/// Sink that drops everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn status(&mut self, _message: &str) {}
}

/// Orchestrates one [`WebDavClient`] for user-facing actions: connection
/// state, the current path, navigation history, and item selection. Has no
/// protocol knowledge; every client failure is converted into a status
/// message and never propagates further.
pub struct Session<S: StatusSink> {
    client: WebDavClient,
    sink: S,
    state: ConnectionState,
    current_path: String,
    path_history: Vec<String>,
    entries: Vec<DirectoryEntry>,
    selected: Option<usize>,
    busy: bool,
    status_message: String,
}

impl<S: StatusSink> Session<S> {
    pub fn new(sink: S) -> Self {
        Self {
            client: WebDavClient::new(),
            sink,
            state: ConnectionState::Disconnected,
            current_path: "/".to_string(),
            path_history: Vec::new(),
            entries: Vec::new(),
            selected: None,
            busy: false,
            status_message: "Ready".to_string(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn path_history(&self) -> &[String] {
        &self.path_history
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Selects an entry of the current listing by index. Selection is
    /// dropped on every refresh, so an index is only valid against the
    /// listing the caller is looking at.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.selected = Some(index);
            true
        } else {
            false
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected_entry(&self) -> Option<&DirectoryEntry> {
        self.selected.and_then(|index| self.entries.get(index))
    }

    /// Connects to a server and loads the root listing.
    pub async fn connect(&mut self, server_url: &str, username: &str, password: &str) {
        if self.reject_if_busy() {
            return;
        }

        if server_url.trim().is_empty() || username.trim().is_empty() {
            self.report("Please enter server URL and username");
            return;
        }

        self.busy = true;
        self.set_state(ConnectionState::Connecting);
        self.report("Connecting...");

        match self.client.set_credentials(server_url, username, password) {
            Ok(()) => {
                if self.client.test_connection().await {
                    self.set_state(ConnectionState::Connected);
                    self.current_path = "/".to_string();
                    self.path_history.clear();
                    self.report("Connected successfully");
                    self.refresh_inner().await;
                } else {
                    self.set_state(ConnectionState::Disconnected);
                    self.report("Failed to connect. Please check your credentials.");
                }
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                self.report(&format!("Connection error: {}", e));
            }
        }

        self.busy = false;
    }

    /// Drops the session state. The client keeps its pooled connections
    /// until new credentials replace them.
    pub fn disconnect(&mut self) {
        self.set_state(ConnectionState::Disconnected);
        self.entries.clear();
        self.path_history.clear();
        self.selected = None;
        self.current_path = "/".to_string();
        self.report("Disconnected");
    }

    /// Reloads the listing of the current path.
    pub async fn refresh(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if self.reject_if_busy() {
            return;
        }

        self.busy = true;
        self.refresh_inner().await;
        self.busy = false;
    }

    async fn refresh_inner(&mut self) {
        self.report("Loading...");
        self.entries.clear();
        self.selected = None;

        match self.client.list_directory(&self.current_path).await {
            Ok(listed) => {
                if self.current_path != "/" {
                    self.entries.push(DirectoryEntry::parent_marker(paths::parent_path(
                        &self.current_path,
                    )));
                }
                let count = listed.len();
                self.entries.extend(listed);
                self.report(&format!("Loaded {} items", count));
            }
            Err(e) => {
                warn!("listing {} failed: {}", self.current_path, e);
                self.report(&format!("Error loading directory: {}", e));
            }
        }
    }

    /// Enters the selected directory. Entering the synthetic `..` entry
    /// goes up without growing the history; a matching history top is
    /// popped so going up and going back stay interchangeable.
    pub async fn navigate_into(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if self.reject_if_busy() {
            return;
        }

        let (is_parent, target) = {
            let Some(entry) = self.selected_entry() else {
                return;
            };
            if !entry.is_directory {
                return;
            }
            (entry.is_parent_marker(), entry.full_path.clone())
        };

        if is_parent {
            self.current_path = target;
            let went_back = self.path_history.last().is_some_and(|previous| {
                paths::trim_trailing_slash(previous)
                    == paths::trim_trailing_slash(&self.current_path)
            });
            if went_back {
                self.path_history.pop();
            }
        } else {
            self.path_history.push(self.current_path.clone());
            self.current_path = target;
        }

        self.refresh().await;
    }

    /// Returns to the most recently visited path, if any.
    pub async fn go_back(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if self.reject_if_busy() {
            return;
        }

        let Some(previous) = self.path_history.pop() else {
            return;
        };
        self.current_path = previous;
        self.refresh().await;
    }

    /// Jumps to the root and forgets the history.
    pub async fn go_home(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if self.reject_if_busy() {
            return;
        }

        self.current_path = "/".to_string();
        self.path_history.clear();
        self.refresh().await;
    }

    /// Creates a collection named `folder_name` under the current path and
    /// reloads the listing on success.
    pub async fn create_folder(&mut self, folder_name: &str) {
        if self.state != ConnectionState::Connected || folder_name.trim().is_empty() {
            return;
        }
        if self.reject_if_busy() {
            return;
        }

        self.busy = true;
        self.report("Creating folder...");

        let path = paths::join_path(&self.current_path, folder_name);
        match self.client.create_directory(&path).await {
            Ok(()) => {
                self.report("Folder created successfully");
                self.refresh_inner().await;
            }
            Err(e) => self.report(&format!("Error creating folder: {}", e)),
        }

        self.busy = false;
    }

    /// Deletes the selected entry and reloads the listing on success. The
    /// synthetic `..` entry is never deletable.
    pub async fn delete_selected(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }

        let target = {
            let Some(entry) = self.selected_entry() else {
                return;
            };
            if entry.is_parent_marker() {
                return;
            }
            entry.full_path.clone()
        };
        if self.reject_if_busy() {
            return;
        }

        self.busy = true;
        self.report("Deleting...");

        match self.client.delete(&target).await {
            Ok(()) => {
                self.report("Item deleted successfully");
                self.refresh_inner().await;
            }
            Err(e) => self.report(&format!("Error deleting item: {}", e)),
        }

        self.busy = false;
    }

    /// Streams the selected file into `dest`. The destination is chosen by
    /// the caller; the sink stays open and its closing is the caller's
    /// responsibility. Does not reload the listing.
    pub async fn download_selected<W>(&mut self, dest: &mut W)
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if self.state != ConnectionState::Connected {
            return;
        }

        let (path, name) = {
            let Some(entry) = self.selected_entry() else {
                return;
            };
            if entry.is_directory {
                return;
            }
            (entry.full_path.clone(), entry.name.clone())
        };
        if self.reject_if_busy() {
            return;
        }

        self.busy = true;
        self.report("Downloading...");

        let result = match self.client.download_file(&path).await {
            Ok(download) => download.write_to(dest).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(written) => self.report(&format!("Downloaded {} ({} bytes)", name, written)),
            Err(e) => self.report(&format!("Error downloading file: {}", e)),
        }

        self.busy = false;
    }

    /// Uploads `source` as `file_name` under the current path and reloads
    /// the listing on success. The caller owns the reader's underlying
    /// resource on every exit path.
    pub async fn upload<R>(&mut self, file_name: &str, source: R)
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        if self.state != ConnectionState::Connected || file_name.trim().is_empty() {
            return;
        }
        if self.reject_if_busy() {
            return;
        }

        self.busy = true;
        self.report("Uploading...");

        let remote_path = paths::join_path(&self.current_path, file_name);
        match self.client.upload_reader(&remote_path, source).await {
            Ok(()) => {
                self.report("File uploaded successfully");
                self.refresh_inner().await;
            }
            Err(e) => self.report(&format!("Error uploading file: {}", e)),
        }

        self.busy = false;
    }

    fn reject_if_busy(&mut self) -> bool {
        if self.busy {
            self.report("Another operation is already in progress");
            return true;
        }
        false
    }

    fn report(&mut self, message: &str) {
        self.status_message = message.to_string();
        self.sink.status(message);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            self.sink.state_changed(state);
        }
    }
}
