//! The build-agent sidecar file protocol (spec.md §4.6). This module is a
//! contract, not an executable: it names the filenames the runner container
//! writes and the sidecar is expected to read/act on/write back, so both
//! sides of `runner::builders::build_agent_watch_loop` and any external
//! sidecar implementation agree on the wire format without sharing code.

/// Suffixes for a "build this tarball into this image" request.
pub mod build_request {
    pub const TARBALL_SUFFIX: &str = ".tar.gz";
    pub const DEST_SUFFIX: &str = ".dest";
    pub const REQUEST_SUFFIX: &str = ".request";
    pub const DONE_SUFFIX: &str = ".done";
    pub const EXITCODE_SUFFIX: &str = ".exitcode";
    pub const LOG_SUFFIX: &str = ".log";
}

/// Suffixes for an "apply this manifest via kubectl" request.
pub mod apply_request {
    pub const MANIFEST_SUFFIX: &str = ".yaml";
    pub const TRIGGER_SUFFIX: &str = ".apply";
    pub const DONE_SUFFIX: &str = ".apply-done";
    pub const EXITCODE_SUFFIX: &str = ".apply-exitcode";
    pub const LOG_SUFFIX: &str = ".apply-log";
}

/// Suffixes for a "run this kubectl command script" request.
pub mod kubectl_request {
    pub const SCRIPT_SUFFIX: &str = ".sh";
    pub const TRIGGER_SUFFIX: &str = ".kubectl";
    pub const DONE_SUFFIX: &str = ".kubectl-done";
    pub const EXITCODE_SUFFIX: &str = ".kubectl-exitcode";
    pub const LOG_SUFFIX: &str = ".kubectl-log";
}

/// Directory both containers of the runner pod mount (spec.md §4.5 step 5).
pub const SHARED_DIR: &str = "/builds";

/// One of the three request kinds a runner container may drop into
/// [`SHARED_DIR`], named by the basename shared across its file group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Build { name: String },
    Apply { name: String },
    Kubectl { name: String },
}

impl RequestKind {
    /// The filename that, once present, signals completion to whichever side
    /// initiated the request (spec.md §4.6: "Completion is always signalled
    /// by the existence of the matching `*.done` file").
    pub fn done_filename(&self) -> String {
        match self {
            RequestKind::Build { name } => format!("{name}{}", build_request::DONE_SUFFIX),
            RequestKind::Apply { name } => format!("{name}{}", apply_request::DONE_SUFFIX),
            RequestKind::Kubectl { name } => format!("{name}{}", kubectl_request::DONE_SUFFIX),
        }
    }

    pub fn exitcode_filename(&self) -> String {
        match self {
            RequestKind::Build { name } => format!("{name}{}", build_request::EXITCODE_SUFFIX),
            RequestKind::Apply { name } => format!("{name}{}", apply_request::EXITCODE_SUFFIX),
            RequestKind::Kubectl { name } => format!("{name}{}", kubectl_request::EXITCODE_SUFFIX),
        }
    }

    pub fn log_filename(&self) -> String {
        match self {
            RequestKind::Build { name } => format!("{name}{}", build_request::LOG_SUFFIX),
            RequestKind::Apply { name } => format!("{name}{}", apply_request::LOG_SUFFIX),
            RequestKind::Kubectl { name } => format!("{name}{}", kubectl_request::LOG_SUFFIX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_filenames_match_spec_suffixes() {
        assert_eq!(RequestKind::Build { name: "job1".into() }.done_filename(), "job1.done");
        assert_eq!(RequestKind::Apply { name: "job1".into() }.done_filename(), "job1.apply-done");
        assert_eq!(RequestKind::Kubectl { name: "job1".into() }.done_filename(), "job1.kubectl-done");
    }
}
