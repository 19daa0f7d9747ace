//! Repository access: local working trees and remote raw-file endpoints.
//!
//! Paths handed to a reader are always relative to the repository root and
//! use `/` separators. Readers are shared across rayon workers during a
//! scan, hence `Send + Sync`.

use crate::error::{AccessError, RemoteRefError, ResolutionError};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Writes file content back into a repository.
pub trait RepositoryWriter: Send + Sync {
    fn write(&self, path: &str, content: &str) -> Result<(), AccessError>;
}

/// Read access to the files of one repository.
pub trait RepositoryAccess: Send + Sync {
    fn supports_glob_patterns(&self) -> bool {
        false
    }

    fn exists(&self, path: &str) -> Result<bool, AccessError>;

    /// Content of `path`, or `None` when it does not exist.
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, AccessError>;

    /// Content of `path` as UTF-8 text. Undecodable bytes are an error, so
    /// content is never rewritten lossily.
    fn read_text(&self, path: &str) -> Result<Option<String>, AccessError> {
        match self.read(path)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|source| AccessError::NotText {
                    path: path.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Location of `path` as a user would look it up.
    fn absolute_location(&self, path: &str) -> String;

    /// Expand a glob pattern into the matching file paths.
    fn glob(&self, pattern: &str) -> Result<Vec<String>, ResolutionError> {
        Err(ResolutionError::Unsupported {
            pattern: pattern.to_string(),
        })
    }

    fn writer(&self) -> Option<&dyn RepositoryWriter> {
        None
    }
}

/// Whether a repository path contains glob metacharacters.
pub fn is_glob_pattern(path: &str) -> bool {
    path.contains(['*', '?', '['])
}

fn io_error(path: &Path, source: io::Error) -> AccessError {
    AccessError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone)]
/// A working tree on the local filesystem.
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

/// Relative path with `/` separators.
fn to_repo_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl RepositoryAccess for LocalRepository {
    fn supports_glob_patterns(&self) -> bool {
        true
    }

    fn exists(&self, path: &str) -> Result<bool, AccessError> {
        Ok(self.resolve(path).is_file())
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, AccessError> {
        let full = self.resolve(path);
        match fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&full, e)),
        }
    }

    fn absolute_location(&self, path: &str) -> String {
        self.resolve(path).display().to_string()
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>, ResolutionError> {
        // Root may itself contain metacharacters; only the pattern part expands
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        let full = format!("{}/{}", root.trim_end_matches('/'), pattern.trim_start_matches('/'));
        let entries = glob::glob(&full).map_err(|e| ResolutionError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.msg.to_string(),
        })?;

        let mut out = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                ResolutionError::Access(io_error(&path, e.into_error()))
            })?;
            // directories match `**` too
            if !path.is_file() {
                continue;
            }
            if let Some(rel) = pathdiff::diff_paths(&path, &self.root) {
                out.push(to_repo_path(&rel));
            }
        }
        out.sort();
        out.dedup();
        debug!(pattern, matches = out.len(), "expanded glob");
        Ok(out)
    }

    fn writer(&self) -> Option<&dyn RepositoryWriter> {
        Some(self)
    }
}

impl RepositoryWriter for LocalRepository {
    /// Atomic replace: write a sibling temp file, then rename it over the target.
    fn write(&self, path: &str, content: &str) -> Result<(), AccessError> {
        let target = self.resolve(path);
        // Temp file must live on the same filesystem for rename to be atomic
        let dir = target.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| io_error(&dir, e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| io_error(tmp.path(), e))?;
        tmp.persist(&target)
            .map_err(|e| io_error(&target, e.error))?;
        debug!(path, "wrote file");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Coordinates of a remote repository revision.
pub struct RemoteRef {
    pub namespace: String,
    pub repository: String,
    pub reference: String,
}

impl RemoteRef {
    /// Parse `ns/repo`, `ns/repo@ref` or `ns/repo/ref`.
    pub fn parse(raw: &str, default_ref: &str) -> Result<Self, RemoteRefError> {
        let raw = raw.trim();
        // `@ref` wins over a trailing path segment
        let (coords, explicit_ref) = match raw.split_once('@') {
            Some((_, r)) if r.trim().is_empty() => return Err(RemoteRefError::EmptyRef),
            Some((coords, r)) => (coords, Some(r.trim())),
            None => (raw, None),
        };
        let (namespace, rest) = coords
            .split_once('/')
            .ok_or(RemoteRefError::MissingSeparator)?;
        if namespace.is_empty() {
            return Err(RemoteRefError::MissingSeparator);
        }
        let (repository, path_ref) = match explicit_ref {
            Some(_) => (rest, None),
            None => match rest.split_once('/') {
                Some((repo, r)) if !r.is_empty() => (repo, Some(r)),
                Some((repo, _)) => (repo, None),
                None => (rest, None),
            },
        };
        if repository.is_empty() {
            return Err(RemoteRefError::EmptyRepository);
        }
        Ok(Self {
            namespace: namespace.to_string(),
            repository: repository.to_string(),
            reference: explicit_ref.or(path_ref).unwrap_or(default_ref).to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Where raw files of a remote repository are served from.
pub enum Provider {
    Github { enterprise_url: Option<String> },
    Bitbucket { server_url: Option<String> },
    /// URL with `{namespace}`, `{repository}`, `{ref}` and `{path}` placeholders.
    UrlTemplate(String),
}

impl Provider {
    pub fn default_ref(&self) -> &'static str {
        match self {
            Provider::Github { .. } | Provider::UrlTemplate(_) => "main",
            Provider::Bitbucket { .. } => "master",
        }
    }

    /// URL pattern for one revision, still carrying the `{path}` placeholder.
    fn url_pattern(&self, r: &RemoteRef) -> String {
        let RemoteRef {
            namespace: ns,
            repository: repo,
            reference,
        } = r;
        match self {
            Provider::Github {
                enterprise_url: None,
            } => format!("https://raw.githubusercontent.com/{ns}/{repo}/{reference}/{{path}}"),
            Provider::Github {
                enterprise_url: Some(base),
            } => format!(
                "{}/raw/{ns}/{repo}/{reference}/{{path}}",
                base.trim_end_matches('/')
            ),
            Provider::Bitbucket { server_url } => format!(
                "{}/{ns}/{repo}/raw/{reference}/{{path}}",
                server_url
                    .as_deref()
                    .unwrap_or("https://bitbucket.org")
                    .trim_end_matches('/')
            ),
            Provider::UrlTemplate(template) => {
                let filled = template
                    .replace("{namespace}", ns)
                    .replace("{repository}", repo)
                    .replace("{ref}", reference);
                // No placeholder: append the path as the last segment
                if filled.contains("{path}") {
                    filled
                } else {
                    format!("{}/{{path}}", filled.trim_end_matches('/'))
                }
            }
        }
    }

    fn authorization(&self, token: &str) -> String {
        match self {
            Provider::Github { .. } => format!("token {token}"),
            Provider::Bitbucket { .. } | Provider::UrlTemplate(_) => format!("Bearer {token}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Minimal blocking HTTP surface used for remote files and configuration.
pub trait HttpTransport: Send + Sync {
    fn head(&self, url: &str, headers: &[(String, String)]) -> Result<u16, AccessError>;
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, AccessError>;
}

/// Production transport backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

fn transient(url: &str, e: reqwest::Error) -> AccessError {
    AccessError::Transient {
        location: url.to_string(),
        message: e.to_string(),
    }
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, AccessError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| transient("http client", e))?;
        Ok(Self { client })
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        headers: &[(String, String)],
    ) -> reqwest::blocking::RequestBuilder {
        headers
            .iter()
            .fold(self.client.request(method, url), |req, (k, v)| {
                req.header(k.as_str(), v.as_str())
            })
    }
}

impl HttpTransport for ReqwestTransport {
    fn head(&self, url: &str, headers: &[(String, String)]) -> Result<u16, AccessError> {
        debug!(url, "HEAD");
        let resp = self
            .request(reqwest::Method::HEAD, url, headers)
            .send()
            .map_err(|e| transient(url, e))?;
        Ok(resp.status().as_u16())
    }

    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, AccessError> {
        debug!(url, "GET");
        let resp = self
            .request(reqwest::Method::GET, url, headers)
            .send()
            .map_err(|e| transient(url, e))?;
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(|e| transient(url, e))?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

/// Raw-file endpoint of a hosted repository.
pub struct RemoteRepository {
    url_pattern: String,
    headers: Vec<(String, String)>,
    transport: Arc<dyn HttpTransport>,
    existence: Mutex<HashMap<String, bool>>,
}

impl std::fmt::Debug for RemoteRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRepository")
            .field("url_pattern", &self.url_pattern)
            .finish_non_exhaustive()
    }
}

impl RemoteRepository {
    pub fn new(
        provider: &Provider,
        remote_ref: &RemoteRef,
        token: Option<&str>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let mut headers = vec![("Accept".to_string(), "text/plain".to_string())];
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            headers.push(("Authorization".to_string(), provider.authorization(token)));
        }
        Self {
            url_pattern: provider.url_pattern(remote_ref),
            headers,
            transport,
            existence: Mutex::new(HashMap::new()),
        }
    }

    /// Check once per URL; later lookups are served from the cache.
    fn head_cached(&self, url: &str) -> Result<bool, AccessError> {
        let cached = self
            .existence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .copied();
        if let Some(found) = cached {
            return Ok(found);
        }
        // Transport errors are not cached; a retry may succeed
        let found = self.transport.head(url, &self.headers)? == 200;
        self.existence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), found);
        Ok(found)
    }
}

impl RepositoryAccess for RemoteRepository {
    fn exists(&self, path: &str) -> Result<bool, AccessError> {
        self.head_cached(&self.absolute_location(path))
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, AccessError> {
        let url = self.absolute_location(path);
        if !self.head_cached(&url)? {
            return Ok(None);
        }
        let resp = self.transport.get(&url, &self.headers)?;
        match resp.status {
            200 => Ok(Some(resp.body)),
            // removed between HEAD and GET
            404 => Ok(None),
            status => Err(AccessError::Remote { url, status }),
        }
    }

    fn absolute_location(&self, path: &str) -> String {
        self.url_pattern
            .replace("{path}", path.trim_start_matches('/'))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory transport serving a fixed set of URLs.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        pub files: HashMap<String, Vec<u8>>,
        pub heads: AtomicUsize,
        pub seen_headers: Mutex<Vec<(String, String)>>,
    }

    impl FakeTransport {
        pub fn with_file(mut self, url: &str, body: &str) -> Self {
            self.files.insert(url.to_string(), body.as_bytes().to_vec());
            self
        }
    }

    impl HttpTransport for FakeTransport {
        fn head(&self, url: &str, headers: &[(String, String)]) -> Result<u16, AccessError> {
            self.heads.fetch_add(1, Ordering::SeqCst);
            *self.seen_headers.lock().unwrap() = headers.to_vec();
            Ok(if self.files.contains_key(url) { 200 } else { 404 })
        }

        fn get(&self, url: &str, _headers: &[(String, String)]) -> Result<HttpResponse, AccessError> {
            Ok(match self.files.get(url) {
                Some(body) => HttpResponse {
                    status: 200,
                    body: body.clone(),
                },
                None => HttpResponse {
                    status: 404,
                    body: Vec::new(),
                },
            })
        }
    }

    fn github(r: &str) -> RemoteRef {
        RemoteRef::parse(r, "main").unwrap()
    }

    #[test]
    fn remote_ref_accepts_all_coordinate_forms() {
        assert_eq!(
            github("acme/widgets"),
            RemoteRef {
                namespace: "acme".into(),
                repository: "widgets".into(),
                reference: "main".into()
            }
        );
        assert_eq!(github("acme/widgets@v1.2").reference, "v1.2");
        assert_eq!(github("acme/widgets/develop").reference, "develop");
        assert_eq!(github("acme/widgets/feature/x").reference, "feature/x");
    }

    #[test]
    fn remote_ref_rejects_malformed_coordinates() {
        assert_eq!(
            RemoteRef::parse("widgets", "main"),
            Err(RemoteRefError::MissingSeparator)
        );
        assert_eq!(
            RemoteRef::parse("acme/widgets@", "main"),
            Err(RemoteRefError::EmptyRef)
        );
        assert_eq!(
            RemoteRef::parse("acme/", "main"),
            Err(RemoteRefError::EmptyRepository)
        );
    }

    #[test]
    fn provider_urls() {
        let r = github("acme/widgets@dev");
        let gh = Provider::Github {
            enterprise_url: None,
        };
        let ghe = Provider::Github {
            enterprise_url: Some("https://git.corp/".into()),
        };
        let bb = Provider::Bitbucket { server_url: None };
        let tpl = Provider::UrlTemplate("https://files.corp/{namespace}/{repository}?at={ref}&p={path}".into());
        let t: Arc<dyn HttpTransport> = Arc::new(FakeTransport::default());
        let loc = |p: &Provider| RemoteRepository::new(p, &r, None, t.clone()).absolute_location("README.md");
        assert_eq!(
            loc(&gh),
            "https://raw.githubusercontent.com/acme/widgets/dev/README.md"
        );
        assert_eq!(loc(&ghe), "https://git.corp/raw/acme/widgets/dev/README.md");
        assert_eq!(loc(&bb), "https://bitbucket.org/acme/widgets/raw/dev/README.md");
        assert_eq!(loc(&tpl), "https://files.corp/acme/widgets?at=dev&p=README.md");
        assert_eq!(bb.default_ref(), "master");
    }

    #[test]
    fn existence_check_is_memoized_per_url() {
        let url = "https://raw.githubusercontent.com/acme/widgets/main/README.md";
        let fake = Arc::new(FakeTransport::default().with_file(url, "# hi"));
        let repo = RemoteRepository::new(
            &Provider::Github {
                enterprise_url: None,
            },
            &github("acme/widgets"),
            Some("secret"),
            fake.clone(),
        );
        assert!(repo.exists("README.md").unwrap());
        assert!(repo.exists("README.md").unwrap());
        assert_eq!(repo.read("README.md").unwrap().as_deref(), Some(&b"# hi"[..]));
        assert_eq!(repo.read("LICENSE").unwrap(), None);
        assert_eq!(fake.heads.load(Ordering::SeqCst), 2);

        let headers = fake.seen_headers.lock().unwrap().clone();
        assert!(headers.contains(&("Accept".into(), "text/plain".into())));
        assert!(headers.contains(&("Authorization".into(), "token secret".into())));
    }

    #[test]
    fn remote_repository_does_not_glob_or_write() {
        let repo = RemoteRepository::new(
            &Provider::Bitbucket { server_url: None },
            &RemoteRef::parse("acme/widgets", "master").unwrap(),
            None,
            Arc::new(FakeTransport::default()),
        );
        assert!(!repo.supports_glob_patterns());
        assert!(matches!(
            repo.glob("*.md"),
            Err(ResolutionError::Unsupported { .. })
        ));
        assert!(repo.writer().is_none());
    }

    #[test]
    fn local_read_glob_and_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs/sub")).unwrap();
        fs::write(dir.path().join("README.md"), "# demo\n").unwrap();
        fs::write(dir.path().join("docs/a.md"), "a").unwrap();
        fs::write(dir.path().join("docs/sub/b.md"), "b").unwrap();

        let repo = LocalRepository::new(dir.path());
        assert!(repo.exists("README.md").unwrap());
        assert_eq!(repo.read("missing.txt").unwrap(), None);
        assert_eq!(
            repo.glob("docs/**/*.md").unwrap(),
            vec!["docs/a.md".to_string(), "docs/sub/b.md".to_string()]
        );
        assert!(repo.glob("nothing/*.txt").unwrap().is_empty());

        let writer = repo.writer().unwrap();
        writer.write("README.md", "# updated\n").unwrap();
        writer.write("new/dir/file.txt", "x").unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("README.md")).unwrap(),
            "# updated\n"
        );
        assert!(dir.path().join("new/dir/file.txt").is_file());
    }

    #[test]
    fn glob_detection() {
        assert!(is_glob_pattern("docs/*.md"));
        assert!(is_glob_pattern("src/**/mod.rs"));
        assert!(!is_glob_pattern("README.md"));
    }
}
