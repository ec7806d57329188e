use anyhow::anyhow;
use ratatui::layout::Rect;
use ratatui::text::Text;
use ratatui::widgets::{Paragraph, Wrap};
use tokio::task::JoinHandle;

use crate::session::ChatSession;
use crate::transcript::transcript;
use crate::ui::chat_lines;

pub struct App {
    pub should_quit: bool,
    pub session: ChatSession,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in chars, not bytes

    // Chat area
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height, set by the renderer
    pub chat_width: u16,  // inner width, set by the renderer
    pub chat_area: Option<Rect>,

    pub reply_task: Option<JoinHandle<anyhow::Result<String>>>,
    pub animation_frame: u8,
}

impl App {
    pub fn new(session: ChatSession) -> Self {
        Self {
            should_quit: false,
            session,
            input: String::new(),
            cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,
            reply_task: None,
            animation_frame: 0,
        }
    }

    /// Send the input box contents. Ignored while a reply is still pending.
    pub fn submit_input(&mut self) {
        if self.reply_task.is_some() {
            return;
        }

        let Some(pending) = self.session.begin(&self.input) else {
            return;
        };

        self.input.clear();
        self.cursor = 0;

        let gateway = self.session.gateway();
        self.reply_task = Some(tokio::spawn(pending.run(gateway)));

        // Keep "Thinking..." in view
        self.scroll_to_bottom();
    }

    /// Hand a finished reply to the session. Does nothing while the task runs.
    pub async fn poll_reply(&mut self) {
        let finished = self
            .reply_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(task) = self.reply_task.take() {
            let result = match task.await {
                Ok(result) => result,
                Err(join_err) => Err(anyhow!("request task failed: {}", join_err)),
            };
            self.session.complete(result);
            self.scroll_to_bottom();
        }
    }

    /// Abort an in-flight request on quit
    pub fn shutdown(&mut self) {
        if let Some(task) = self.reply_task.take() {
            task.abort();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Wrapped height of the whole transcript, measured the way the chat renders it
    pub fn chat_line_count(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 { self.chat_width } else { 50 };

        let lines = chat_lines(&transcript(&self.session), self.animation_frame);
        let rows = Paragraph::new(Text::from(lines))
            .wrap(Wrap { trim: false })
            .line_count(wrap_width);

        u16::try_from(rows).unwrap_or(u16::MAX)
    }

    pub fn max_scroll(&self) -> u16 {
        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        self.chat_line_count().saturating_sub(visible_height)
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::ScriptedGateway;
    use crate::state::Turn;

    fn app() -> App {
        App::new(ChatSession::new(ScriptedGateway::new(vec![Ok("pong")])))
    }

    #[tokio::test]
    async fn test_submit_then_poll_records_both_turns() {
        let mut app = app();
        app.input = "ping".to_string();
        app.cursor = 4;

        app.submit_input();
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
        assert!(app.reply_task.is_some());

        // Input is refused while the reply is pending
        app.input = "again".to_string();
        app.submit_input();
        assert_eq!(app.session.conversation().len(), 1);

        while app.reply_task.is_some() {
            tokio::task::yield_now().await;
            app.poll_reply().await;
        }

        assert_eq!(
            app.session.conversation().all(),
            &[Turn::user("ping"), Turn::model("pong")]
        );
        assert_eq!(app.input, "again");
    }

    #[test]
    fn test_blank_input_spawns_nothing() {
        let mut app = app();
        app.input = "   ".to_string();
        app.submit_input();
        assert!(app.reply_task.is_none());
        assert!(app.session.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_scroll_stays_within_bounds() {
        let mut app = App::new(ChatSession::new(ScriptedGateway::new(vec![])));
        app.chat_height = 4;
        app.chat_width = 20;
        for i in 0..5 {
            app.session.submit(&format!("message {}", i)).await;
        }

        let max = app.max_scroll();
        assert!(max > 0);

        app.scroll_down(1000);
        assert_eq!(app.chat_scroll, max);
        app.scroll_up(1000);
        assert_eq!(app.chat_scroll, 0);
        app.scroll_to_bottom();
        assert_eq!(app.chat_scroll, max);
    }

    #[tokio::test]
    async fn test_line_count_follows_word_wrapping() {
        // Eleven-letter words never share a 20-column row
        let mut reply = "aaaaaaaaaaa ".repeat(9);
        reply.push_str("zzzzzzzzzzz");

        let mut app = App::new(ChatSession::new(ScriptedGateway::new(vec![Ok(reply.as_str())])));
        app.chat_width = 20;
        app.chat_height = 5;
        app.session.submit("q").await;

        // "user:", "q", blank, "model:", ten reply rows, blank
        assert_eq!(app.chat_line_count(), 15);
        assert_eq!(app.max_scroll(), 10);
    }
}
