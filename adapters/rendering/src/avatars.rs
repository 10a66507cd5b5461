//! Background loading of avatar and gift images.
//!
//! Images are fetched on short-lived worker threads so the frame loop never
//! blocks on the network. Backends poll [`AvatarCache::resolve`] once per
//! frame to turn finished downloads into their own texture type, and draw a
//! fallback fill for anything still pending or failed.

use galton_board_core::ImageRef;
use std::{
    collections::HashMap,
    error::Error,
    fmt, io,
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc,
    },
    thread,
    time::Duration,
};
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("galton-board/", env!("CARGO_PKG_VERSION"));

/// Errors raised while fetching an image.
#[derive(Debug)]
pub enum AvatarError {
    /// Reading a local image failed.
    Io(io::Error),
    /// The HTTP request failed before a response arrived.
    Http(reqwest::Error),
    /// The server answered with a non-success status.
    Status(u16),
}

impl fmt::Display for AvatarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(error) => write!(f, "failed to read image: {error}"),
            Self::Http(error) => write!(f, "failed to download image: {error}"),
            Self::Status(status) => write!(f, "image server answered with status {status}"),
        }
    }
}

impl Error for AvatarError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            Self::Http(error) => Some(error),
            Self::Status(_) => None,
        }
    }
}

impl From<io::Error> for AvatarError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<reqwest::Error> for AvatarError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(error)
    }
}

/// Fetches the raw bytes behind an image reference.
pub trait AvatarSource: Send + Sync {
    /// Loads the encoded image. Called from a worker thread.
    fn fetch(&self, image: &ImageRef) -> Result<Vec<u8>, AvatarError>;
}

/// Source that downloads remote images over HTTP and reads everything else
/// from the local filesystem.
#[derive(Clone, Debug)]
pub struct HttpAvatarSource {
    client: reqwest::blocking::Client,
}

impl HttpAvatarSource {
    /// Creates a source whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, AvatarError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl AvatarSource for HttpAvatarSource {
    fn fetch(&self, image: &ImageRef) -> Result<Vec<u8>, AvatarError> {
        if !image.is_remote() {
            return Ok(std::fs::read(image.as_str())?);
        }

        let response = self.client.get(image.as_str()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(AvatarError::Status(status.as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// Loading state of a single image.
#[derive(Clone, Debug, PartialEq)]
pub enum AvatarState<T> {
    /// Fetch in flight.
    Pending,
    /// Decoded and ready to draw.
    Ready(T),
    /// Fetch or decode failed; callers draw the fallback fill.
    Failed,
}

type Completion = (ImageRef, Result<Vec<u8>, AvatarError>);

/// Cache of decoded images keyed by their reference.
///
/// Each reference is fetched at most once, failures included.
pub struct AvatarCache<T> {
    source: Arc<dyn AvatarSource>,
    entries: HashMap<ImageRef, AvatarState<T>>,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
}

impl<T> AvatarCache<T> {
    /// Creates an empty cache loading through `source`.
    #[must_use]
    pub fn new(source: Arc<dyn AvatarSource>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            source,
            entries: HashMap::new(),
            sender,
            receiver,
        }
    }

    /// Starts loading `image` unless it was requested before.
    pub fn request(&mut self, image: &ImageRef) {
        if self.entries.contains_key(image) {
            return;
        }
        let _ = self.entries.insert(image.clone(), AvatarState::Pending);

        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        let target = image.clone();
        let spawned = thread::Builder::new()
            .name("avatar-loader".to_owned())
            .spawn(move || {
                let result = source.fetch(&target);
                let _ = sender.send((target, result));
            });

        if let Err(error) = spawned {
            warn!(image = image.as_str(), %error, "failed to start avatar loader");
            let _ = self.entries.insert(image.clone(), AvatarState::Failed);
        }
    }

    /// Moves finished fetches into the cache, decoding them with `decode`.
    ///
    /// Returns the number of images that changed state.
    pub fn resolve<F>(&mut self, mut decode: F) -> usize
    where
        F: FnMut(&ImageRef, &[u8]) -> Option<T>,
    {
        let mut resolved = 0;
        while let Ok((image, result)) = self.receiver.try_recv() {
            let state = match result {
                Ok(bytes) => match decode(&image, &bytes) {
                    Some(decoded) => {
                        debug!(image = image.as_str(), bytes = bytes.len(), "image loaded");
                        AvatarState::Ready(decoded)
                    }
                    None => {
                        warn!(image = image.as_str(), "image could not be decoded");
                        AvatarState::Failed
                    }
                },
                Err(error) => {
                    warn!(image = image.as_str(), %error, "image could not be loaded");
                    AvatarState::Failed
                }
            };
            let _ = self.entries.insert(image, state);
            resolved += 1;
        }
        resolved
    }

    /// Current state of `image`, or `None` when it was never requested.
    #[must_use]
    pub fn state(&self, image: &ImageRef) -> Option<&AvatarState<T>> {
        self.entries.get(image)
    }

    /// Decoded image, when ready.
    #[must_use]
    pub fn get(&self, image: &ImageRef) -> Option<&T> {
        match self.entries.get(image) {
            Some(AvatarState::Ready(decoded)) => Some(decoded),
            _ => None,
        }
    }

    /// Number of images requested so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether nothing was requested yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Instant,
    };

    struct ScriptedSource {
        fetches: AtomicUsize,
    }

    impl AvatarSource for ScriptedSource {
        fn fetch(&self, image: &ImageRef) -> Result<Vec<u8>, AvatarError> {
            let _ = self.fetches.fetch_add(1, Ordering::SeqCst);
            match image.as_str() {
                "missing.png" => Err(AvatarError::Status(404)),
                other => Ok(other.as_bytes().to_vec()),
            }
        }
    }

    fn settle<T>(
        cache: &mut AvatarCache<T>,
        expected: usize,
        mut decode: impl FnMut(&[u8]) -> Option<T>,
    ) {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut resolved = 0;
        while resolved < expected && Instant::now() < deadline {
            resolved += cache.resolve(|_, bytes| decode(bytes));
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(resolved, expected, "loader threads did not finish");
    }

    #[test]
    fn images_are_fetched_once_and_decoded() {
        let source = Arc::new(ScriptedSource {
            fetches: AtomicUsize::new(0),
        });
        let mut cache: AvatarCache<usize> = AvatarCache::new(source.clone());
        let avatar = ImageRef::new("ada.png");

        cache.request(&avatar);
        cache.request(&avatar);
        assert_eq!(cache.state(&avatar), Some(&AvatarState::Pending));

        settle(&mut cache, 1, |bytes| Some(bytes.len()));

        assert_eq!(cache.get(&avatar), Some(&7));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_fetches_and_decodes_are_remembered() {
        let source = Arc::new(ScriptedSource {
            fetches: AtomicUsize::new(0),
        });
        let mut cache: AvatarCache<()> = AvatarCache::new(source);
        let missing = ImageRef::new("missing.png");
        let garbled = ImageRef::new("garbled.png");

        cache.request(&missing);
        cache.request(&garbled);
        settle(&mut cache, 2, |_| None);

        assert_eq!(cache.state(&missing), Some(&AvatarState::Failed));
        assert_eq!(cache.state(&garbled), Some(&AvatarState::Failed));
        assert!(cache.get(&missing).is_none());
        assert!(cache.state(&ImageRef::new("never.png")).is_none());
    }

    #[test]
    fn local_paths_are_read_from_disk() {
        let path = std::env::temp_dir().join(format!("galton-avatar-{}.bin", std::process::id()));
        std::fs::write(&path, [1u8, 2, 3]).expect("write fixture");
        let source = HttpAvatarSource::new(Duration::from_secs(1)).expect("client");

        let bytes = source
            .fetch(&ImageRef::new(path.to_string_lossy()))
            .expect("local read");

        assert_eq!(bytes, vec![1, 2, 3]);
        let _ = std::fs::remove_file(path);
    }
}
