//! Client side of the decoration service.
//!
//! The service draws frame windows, tab bars and the alignment overlay. It
//! runs as a separate process and speaks newline-delimited JSON over a Unix
//! socket: one request object tagged by `method`, answered by one reply
//! object tagged by `status`.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::Child;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WmError;
use crate::spawn;
use crate::types::{FrameId, WindowId};

/// Connection attempts made after starting the service command
const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_INTERVAL: Duration = Duration::from_millis(100);

/// Get the default socket path for this display
pub fn socket_path() -> PathBuf {
    let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string());
    let sanitized = display.replace([':', '.'], "_");
    PathBuf::from(format!("/tmp/framewm-decorations{}.sock", sanitized))
}

/// Where a tab should be moved within its frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabPosition {
    Index(usize),
    /// One step right, wrapping to the front
    Next,
    /// One step left, wrapping to the back
    Prev,
}

/// Operations the window manager needs from the decoration service.
///
/// Queries that name a window answer `None` when the service reports none
/// (wire value 0).
pub trait DecorationService {
    /// Create a frame window; it is mapped by the manager later
    fn create_frame(&mut self) -> Result<FrameId, WmError>;
    fn destroy_frame(&mut self, fid: FrameId) -> Result<(), WmError>;
    /// Add a tab; adding a window that already has a tab does nothing
    fn add_tab(&mut self, fid: FrameId, wid: WindowId, title: &str, classes: &[String]) -> Result<(), WmError>;
    fn remove_tab(&mut self, fid: FrameId, wid: WindowId) -> Result<(), WmError>;
    fn rename_tab(&mut self, fid: FrameId, wid: WindowId, title: &str) -> Result<(), WmError>;
    fn set_tab_icon(&mut self, fid: FrameId, wid: WindowId, title: &str, classes: &[String]) -> Result<(), WmError>;
    fn reorder_tab(&mut self, fid: FrameId, wid: WindowId, position: TabPosition) -> Result<(), WmError>;
    fn get_active_tab(&mut self, fid: FrameId) -> Result<Option<WindowId>, WmError>;
    fn goto_tab(&mut self, fid: FrameId, wid: WindowId) -> Result<(), WmError>;
    fn next_tab(&mut self, fid: FrameId) -> Result<Option<WindowId>, WmError>;
    fn prev_tab(&mut self, fid: FrameId) -> Result<Option<WindowId>, WmError>;
    fn goto_tab_index(&mut self, fid: FrameId, index: usize) -> Result<Option<WindowId>, WmError>;
    /// Tabs of every frame; a frame without tabs lists `[0]`
    fn list_all_tabs(&mut self) -> Result<HashMap<FrameId, Vec<WindowId>>, WmError>;
    fn assign_color(&mut self, fid: FrameId, wid: WindowId, class_key: &str, rgb: u32) -> Result<(), WmError>;
    fn clear_color(&mut self, wid: WindowId) -> Result<(), WmError>;
    fn set_focus_style(&mut self, fid: FrameId, focused: bool) -> Result<(), WmError>;
    fn toggle_fullscreen_chrome(&mut self, fid: FrameId) -> Result<(), WmError>;
    fn show_alignment_overlay(&mut self) -> Result<(), WmError>;
    fn hide_alignment_overlay(&mut self) -> Result<(), WmError>;
}

/// Requests sent to the service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    CreateFrame,
    DestroyFrame { fid: FrameId },
    AddTab {
        fid: FrameId,
        wid: WindowId,
        title: String,
        classes: Vec<String>,
    },
    RemoveTab { fid: FrameId, wid: WindowId },
    RenameTab { fid: FrameId, wid: WindowId, title: String },
    SetTabIcon {
        fid: FrameId,
        wid: WindowId,
        title: String,
        classes: Vec<String>,
    },
    ReorderTab {
        fid: FrameId,
        wid: WindowId,
        position: TabPosition,
    },
    GetActiveTab { fid: FrameId },
    GotoTab { fid: FrameId, wid: WindowId },
    NextTab { fid: FrameId },
    PrevTab { fid: FrameId },
    GotoTabIndex { fid: FrameId, index: usize },
    ListAllTabs,
    AssignColor {
        fid: FrameId,
        wid: WindowId,
        class_key: String,
        rgb: u32,
    },
    ClearColor { wid: WindowId },
    SetFocusStyle { fid: FrameId, focused: bool },
    ToggleFullscreenChrome { fid: FrameId },
    ShowAlignmentOverlay,
    HideAlignmentOverlay,
}

/// Replies from the service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    /// Operation succeeded with no data
    Ok,
    /// Newly created frame
    Frame { fid: FrameId },
    /// A window, 0 for none
    Window { wid: WindowId },
    /// Tabs of every frame, keyed by frame id in decimal
    Tabs { tabs: HashMap<String, Vec<WindowId>> },
    /// Error response
    Error { code: String, message: String },
}

/// JSON-lines client over a Unix socket
pub struct RpcDecorations {
    writer: UnixStream,
    reader: BufReader<UnixStream>,
    /// Service process started by us, if any
    child: Option<Child>,
}

impl RpcDecorations {
    /// Connect to the service, starting `command` first if it is not up yet
    pub fn connect(path: &Path, command: Option<&str>) -> Result<Self, WmError> {
        if let Ok(stream) = UnixStream::connect(path) {
            log::info!("Connected to decoration service at {:?}", path);
            return Self::from_stream(stream);
        }

        let Some(command) = command else {
            return Err(WmError::ServiceUnavailable(format!("no service listening on {:?}", path)));
        };
        let child = spawn::spawn(command);
        for _ in 0..CONNECT_ATTEMPTS {
            std::thread::sleep(CONNECT_INTERVAL);
            if let Ok(stream) = UnixStream::connect(path) {
                log::info!("Started decoration service '{}' at {:?}", command, path);
                let mut client = Self::from_stream(stream)?;
                client.child = child;
                return Ok(client);
            }
        }
        if let Some(mut child) = child {
            spawn::terminate(&mut child);
        }
        Err(WmError::ServiceUnavailable(format!(
            "'{}' did not open {:?} in time",
            command, path
        )))
    }

    pub fn from_stream(stream: UnixStream) -> Result<Self, WmError> {
        let reader = stream.try_clone().map_err(io_error)?;
        Ok(Self {
            writer: stream,
            reader: BufReader::new(reader),
            child: None,
        })
    }

    /// Send a request and wait for its reply
    pub fn call(&mut self, request: &Request) -> Result<Reply, WmError> {
        let json = serde_json::to_string(request).map_err(|e| WmError::MalformedReply(e.to_string()))?;
        writeln!(self.writer, "{}", json).map_err(io_error)?;
        self.writer.flush().map_err(io_error)?;

        let mut line = String::new();
        if self.reader.read_line(&mut line).map_err(io_error)? == 0 {
            return Err(WmError::ServiceUnavailable("connection closed".to_string()));
        }
        let reply: Reply = serde_json::from_str(&line)
            .map_err(|e| WmError::MalformedReply(format!("{}: {}", e, line.trim_end())))?;
        log::debug!("Decoration service: {:?} -> {:?}", request, reply);

        match reply {
            Reply::Error { code, message } => Err(WmError::ServiceRejected(format!("{}: {}", code, message))),
            reply => Ok(reply),
        }
    }

    fn call_ok(&mut self, request: Request) -> Result<(), WmError> {
        match self.call(&request)? {
            Reply::Ok => Ok(()),
            other => Err(unexpected("ok", &other)),
        }
    }

    fn call_window(&mut self, request: Request) -> Result<Option<WindowId>, WmError> {
        match self.call(&request)? {
            Reply::Window { wid: 0 } => Ok(None),
            Reply::Window { wid } => Ok(Some(wid)),
            other => Err(unexpected("window", &other)),
        }
    }
}

impl Drop for RpcDecorations {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            spawn::terminate(child);
        }
    }
}

fn io_error(e: std::io::Error) -> WmError {
    WmError::ServiceUnavailable(e.to_string())
}

fn unexpected(expected: &str, reply: &Reply) -> WmError {
    WmError::MalformedReply(format!("expected {} reply, got {:?}", expected, reply))
}

impl DecorationService for RpcDecorations {
    fn create_frame(&mut self) -> Result<FrameId, WmError> {
        match self.call(&Request::CreateFrame)? {
            Reply::Frame { fid } if fid != 0 => Ok(fid),
            other => Err(unexpected("frame", &other)),
        }
    }

    fn destroy_frame(&mut self, fid: FrameId) -> Result<(), WmError> {
        self.call_ok(Request::DestroyFrame { fid })
    }

    fn add_tab(&mut self, fid: FrameId, wid: WindowId, title: &str, classes: &[String]) -> Result<(), WmError> {
        self.call_ok(Request::AddTab {
            fid,
            wid,
            title: title.to_string(),
            classes: classes.to_vec(),
        })
    }

    fn remove_tab(&mut self, fid: FrameId, wid: WindowId) -> Result<(), WmError> {
        self.call_ok(Request::RemoveTab { fid, wid })
    }

    fn rename_tab(&mut self, fid: FrameId, wid: WindowId, title: &str) -> Result<(), WmError> {
        self.call_ok(Request::RenameTab {
            fid,
            wid,
            title: title.to_string(),
        })
    }

    fn set_tab_icon(&mut self, fid: FrameId, wid: WindowId, title: &str, classes: &[String]) -> Result<(), WmError> {
        self.call_ok(Request::SetTabIcon {
            fid,
            wid,
            title: title.to_string(),
            classes: classes.to_vec(),
        })
    }

    fn reorder_tab(&mut self, fid: FrameId, wid: WindowId, position: TabPosition) -> Result<(), WmError> {
        self.call_ok(Request::ReorderTab { fid, wid, position })
    }

    fn get_active_tab(&mut self, fid: FrameId) -> Result<Option<WindowId>, WmError> {
        self.call_window(Request::GetActiveTab { fid })
    }

    fn goto_tab(&mut self, fid: FrameId, wid: WindowId) -> Result<(), WmError> {
        self.call_ok(Request::GotoTab { fid, wid })
    }

    fn next_tab(&mut self, fid: FrameId) -> Result<Option<WindowId>, WmError> {
        self.call_window(Request::NextTab { fid })
    }

    fn prev_tab(&mut self, fid: FrameId) -> Result<Option<WindowId>, WmError> {
        self.call_window(Request::PrevTab { fid })
    }

    fn goto_tab_index(&mut self, fid: FrameId, index: usize) -> Result<Option<WindowId>, WmError> {
        self.call_window(Request::GotoTabIndex { fid, index })
    }

    fn list_all_tabs(&mut self) -> Result<HashMap<FrameId, Vec<WindowId>>, WmError> {
        match self.call(&Request::ListAllTabs)? {
            Reply::Tabs { tabs } => tabs
                .into_iter()
                .map(|(fid, wids)| {
                    fid.parse::<FrameId>()
                        .map(|fid| (fid, wids))
                        .map_err(|_| WmError::MalformedReply(format!("bad frame id '{}'", fid)))
                })
                .collect(),
            other => Err(unexpected("tabs", &other)),
        }
    }

    fn assign_color(&mut self, fid: FrameId, wid: WindowId, class_key: &str, rgb: u32) -> Result<(), WmError> {
        self.call_ok(Request::AssignColor {
            fid,
            wid,
            class_key: class_key.to_string(),
            rgb,
        })
    }

    fn clear_color(&mut self, wid: WindowId) -> Result<(), WmError> {
        self.call_ok(Request::ClearColor { wid })
    }

    fn set_focus_style(&mut self, fid: FrameId, focused: bool) -> Result<(), WmError> {
        self.call_ok(Request::SetFocusStyle { fid, focused })
    }

    fn toggle_fullscreen_chrome(&mut self, fid: FrameId) -> Result<(), WmError> {
        self.call_ok(Request::ToggleFullscreenChrome { fid })
    }

    fn show_alignment_overlay(&mut self) -> Result<(), WmError> {
        self.call_ok(Request::ShowAlignmentOverlay)
    }

    fn hide_alignment_overlay(&mut self) -> Result<(), WmError> {
        self.call_ok(Request::HideAlignmentOverlay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// Serve canned replies, one per received line, and return the requests seen
    fn serve(replies: Vec<&'static str>) -> (RpcDecorations, thread::JoinHandle<Vec<String>>) {
        let (client, server) = UnixStream::pair().unwrap();
        let handle = thread::spawn(move || {
            let mut reader = BufReader::new(server.try_clone().unwrap());
            let mut writer = server;
            let mut seen = Vec::new();
            for reply in replies {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 {
                    break;
                }
                seen.push(line.trim_end().to_string());
                writeln!(writer, "{}", reply).unwrap();
            }
            seen
        });
        (RpcDecorations::from_stream(client).unwrap(), handle)
    }

    #[test]
    fn test_request_serialization() {
        let json = serde_json::to_string(&Request::CreateFrame).unwrap();
        assert_eq!(json, r#"{"method":"create_frame"}"#);

        let json = serde_json::to_string(&Request::ReorderTab {
            fid: 1,
            wid: 2,
            position: TabPosition::Next,
        })
        .unwrap();
        assert!(json.contains(r#""method":"reorder_tab""#));
        assert!(json.contains(r#""position":"next""#));

        let json = serde_json::to_string(&TabPosition::Index(3)).unwrap();
        assert_eq!(json, r#"{"index":3}"#);
    }

    #[test]
    fn test_reply_deserialization() {
        let reply: Reply = serde_json::from_str(r#"{"status":"tabs","tabs":{"4096":[1,2],"4097":[0]}}"#).unwrap();
        match reply {
            Reply::Tabs { tabs } => {
                assert_eq!(tabs["4096"], vec![1, 2]);
                assert_eq!(tabs["4097"], vec![0]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_over_socket() {
        let (mut client, server) = serve(vec![
            r#"{"status":"frame","fid":4096}"#,
            r#"{"status":"ok"}"#,
            r#"{"status":"window","wid":0}"#,
            r#"{"status":"window","wid":77}"#,
        ]);
        assert_eq!(client.create_frame().unwrap(), 4096);
        client
            .add_tab(4096, 77, "term", &["xterm".to_string(), "XTerm".to_string()])
            .unwrap();
        assert_eq!(client.get_active_tab(4096).unwrap(), None);
        assert_eq!(client.next_tab(4096).unwrap(), Some(77));

        let seen = server.join().unwrap();
        assert_eq!(seen[0], r#"{"method":"create_frame"}"#);
        assert!(seen[1].contains(r#""classes":["xterm","XTerm"]"#));
        assert!(seen[3].contains(r#""method":"next_tab""#));
    }

    #[test]
    fn test_error_and_malformed_replies() {
        let (mut client, server) = serve(vec![
            r#"{"status":"error","code":"no_frame","message":"unknown frame"}"#,
            r#"not json"#,
            r#"{"status":"ok"}"#,
        ]);
        assert!(matches!(client.destroy_frame(9), Err(WmError::ServiceRejected(_))));
        assert!(matches!(client.goto_tab(9, 1), Err(WmError::MalformedReply(_))));
        // Wrong reply shape for the request
        assert!(matches!(client.list_all_tabs(), Err(WmError::MalformedReply(_))));
        server.join().unwrap();
    }

    #[test]
    fn test_closed_channel_is_unavailable() {
        let (mut client, server) = serve(vec![]);
        server.join().unwrap();
        let err = client.show_alignment_overlay().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_connect_without_service() {
        let path = std::env::temp_dir().join(format!("framewm-missing-{}.sock", std::process::id()));
        let err = RpcDecorations::connect(&path, None).err().unwrap();
        assert!(matches!(err, WmError::ServiceUnavailable(_)));
    }

    #[test]
    fn test_dropping_client_collects_started_service() {
        let (stream, _peer) = UnixStream::pair().unwrap();
        let mut client = RpcDecorations::from_stream(stream).unwrap();
        let child = spawn::spawn("sleep 30").unwrap();
        let pid = child.id();
        client.child = Some(child);

        drop(client);
        // Killed and waited for: no zombie left behind
        assert!(!std::path::Path::new(&format!("/proc/{}", pid)).exists());
    }
}
