/*!
KDE Plasma desktop integration over the session bus.

Window owners come from a KWin script evaluated through `org.kde.KWin`; the
media-control global shortcut arrives as a KGlobalAccel component signal and
requests an immediate activity check.
*/

use std::collections::HashSet;
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, info, warn};
use zbus::zvariant::OwnedValue;
use zbus::{Connection, MatchRule, Message, MessageStream};

use crate::error::MonitorError;
use crate::host::WakeHandle;
use crate::monitor::session::{self, SessionFailure};
use crate::monitor::{ProcessId, WindowEnumerator};

const KWIN_SERVICE: &str = "org.kde.KWin";
const KWIN_PATH: &str = "/KWin";
const KWIN_INTERFACE: &str = "org.kde.KWin";

// Evaluates to "pid;pid;..." for every managed window
const WINDOW_PIDS_SCRIPT: &str = "workspace.windowList().map(w => w.pid).join(';');";

const SHORTCUT_PATH: &str = "/components/mediacontrol";
const SHORTCUT_INTERFACE: &str = "org.kde.kglobalaccel.Component";
const SHORTCUT_SIGNAL: &str = "globalShortcutPressed";

/// True when the session advertises a KDE desktop
pub fn is_kde_session() -> bool {
    std::env::var("XDG_CURRENT_DESKTOP")
        .map(|desktops| desktops.split(':').any(|d| d.eq_ignore_ascii_case("KDE")))
        .unwrap_or(false)
}

async fn connect(address: Option<&str>) -> zbus::Result<Connection> {
    match address {
        Some(address) => zbus::connection::Builder::address(address)?.build().await,
        None => Connection::session().await,
    }
}

/// Parse the `;`-separated pid list; anything that is not a positive pid is skipped
pub fn parse_window_pids(text: &str) -> HashSet<ProcessId> {
    text.split(';')
        .filter_map(|entry| entry.trim().parse::<ProcessId>().ok())
        .filter(|&pid| pid != 0)
        .collect()
}

// Script results come back either as a plain string or wrapped in a variant
fn reply_text(reply: &Message) -> zbus::Result<String> {
    let body = reply.body();
    match body.deserialize::<String>() {
        Ok(text) => Ok(text),
        Err(_) => {
            let value: OwnedValue = body.deserialize()?;
            String::try_from(value).map_err(zbus::Error::Variant)
        }
    }
}

/// Window enumerator asking KWin which processes own windows
#[derive(Debug, Clone)]
pub struct KWinWindowEnumerator {
    address: Option<String>,
    timeout: Duration,
}

impl KWinWindowEnumerator {
    pub fn new(timeout: Duration) -> Self {
        Self { address: None, timeout }
    }

    /// Use a specific bus instead of the session bus
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    async fn query(&self) -> zbus::Result<String> {
        let connection = connect(self.address.as_deref()).await?;
        let reply = connection
            .call_method(
                Some(KWIN_SERVICE),
                KWIN_PATH,
                Some(KWIN_INTERFACE),
                "evaluateScript",
                &(WINDOW_PIDS_SCRIPT,),
            )
            .await?;
        reply_text(&reply)
    }
}

impl WindowEnumerator for KWinWindowEnumerator {
    fn list_foreground_process_ids(&self) -> Result<HashSet<ProcessId>, MonitorError> {
        let text = session::run_bounded(self.timeout, self.query())
            .map_err(|failure: SessionFailure| MonitorError::WindowQueryFailed(failure.to_string()))?
            .map_err(|e| MonitorError::WindowQueryFailed(format!("KWin: {}", e)))?;

        let pids = parse_window_pids(&text);
        debug!("KWin reported {} window owners", pids.len());
        Ok(pids)
    }
}

/// Forwards presses of the media-control global shortcut to the host loop
pub struct MediaShortcutListener {
    wake: WakeHandle,
    address: Option<String>,
}

impl MediaShortcutListener {
    pub fn new(wake: WakeHandle) -> Self {
        Self { wake, address: None }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Subscribe and wake the host loop on every press
    ///
    /// Returns once the host loop is gone or the bus closes the stream.
    pub async fn listen(self) -> Result<(), MonitorError> {
        let unavailable = |e: zbus::Error| MonitorError::ShortcutUnavailable(e.to_string());

        let connection = connect(self.address.as_deref()).await.map_err(unavailable)?;
        let rule = MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .path(SHORTCUT_PATH)
            .and_then(|rule| rule.interface(SHORTCUT_INTERFACE))
            .and_then(|rule| rule.member(SHORTCUT_SIGNAL))
            .map_err(unavailable)?
            .build();
        let mut presses = MessageStream::for_match_rule(rule, &connection, None)
            .await
            .map_err(unavailable)?;

        info!("Listening for the media-control shortcut");
        while let Some(press) = presses.next().await {
            match press {
                Ok(_) => {
                    debug!("Media-control shortcut pressed");
                    if !self.wake.wake() {
                        break;
                    }
                }
                Err(e) => warn!("Malformed shortcut signal: {}", e),
            }
        }
        Ok(())
    }
}
