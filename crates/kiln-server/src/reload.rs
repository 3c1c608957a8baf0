//! Live-reload notifications pushed to connected browsers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Path the browser script connects to.
pub const RELOAD_SOCKET_PATH: &str = "/__kiln/livereload";

/// Path the browser script is served from.
pub const RELOAD_SCRIPT_PATH: &str = "/__kiln/livereload.js";

/// Messages sent to browsers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload
    Reload,

    /// Stylesheets changed; swap them without reloading
    Css,
}

/// Broadcasts reload messages to every connected browser.
///
/// Constructed once per process and handed to both the watch loop and the
/// dev server.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers just means no browser is open.
        if let Ok(browsers) = self.sender.send(msg) {
            tracing::debug!("Notified {} browser(s)", browsers);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate the browser-side live-reload script.
pub fn reload_client_script() -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var protocol = location.protocol === 'https:' ? 'wss://' : 'ws://';
  var attempts = 0;

  function swapStylesheets() {{
    document.querySelectorAll('link[rel="stylesheet"]').forEach(function(link) {{
      var url = new URL(link.href, location.href);
      if (url.host !== location.host) {{
        return;
      }}
      url.searchParams.set('kiln', Date.now());
      link.href = url.toString();
    }});
  }}

  function connect() {{
    var ws = new WebSocket(protocol + location.host + '{socket}');

    ws.onopen = function() {{
      attempts = 0;
    }};

    ws.onmessage = function(event) {{
      var msg = JSON.parse(event.data);
      switch (msg.type) {{
        case 'reload':
          location.reload();
          break;
        case 'css':
          swapStylesheets();
          break;
        case 'connected':
          console.log('[kiln] live reload connected');
          break;
      }}
    }};

    ws.onclose = function() {{
      if (attempts < 10) {{
        attempts++;
        setTimeout(connect, 1000 * attempts);
      }}
    }};
  }}

  connect();
}})();
"#,
        socket = RELOAD_SOCKET_PATH
    )
}

/// Insert the live-reload script tag before `</body>`, or append it.
pub fn inject_reload_script(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, RELOAD_SCRIPT_PATH);

    match html.rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..index]);
            out.push_str(&tag);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{}{}", html, tag),
    }
}
