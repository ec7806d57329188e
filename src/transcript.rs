use crate::session::ChatSession;
use crate::state::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleKind {
    User,
    Model,
    Error,
    /// Placeholder for the reply still in flight
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub kind: BubbleKind,
    pub text: String,
}

/// Everything the chat area shows, in display order.
///
/// Pure: the same session always yields the same bubbles.
pub fn transcript(session: &ChatSession) -> Vec<Bubble> {
    let notices = session.notices();
    let mut bubbles = Vec::with_capacity(session.conversation().len() + notices.len() + 1);

    for (index, turn) in session.conversation().all().iter().enumerate() {
        let kind = match turn.role {
            Role::User => BubbleKind::User,
            Role::Model => BubbleKind::Model,
        };
        bubbles.push(Bubble {
            kind,
            text: turn.content.clone(),
        });

        bubbles.extend(
            notices
                .iter()
                .filter(|notice| notice.turn_index == index)
                .map(|notice| Bubble {
                    kind: BubbleKind::Error,
                    text: notice.message.clone(),
                }),
        );
    }

    if session.is_waiting() {
        bubbles.push(Bubble {
            kind: BubbleKind::Pending,
            text: String::new(),
        });
    }

    bubbles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::ScriptedGateway;

    fn kinds(bubbles: &[Bubble]) -> Vec<BubbleKind> {
        bubbles.iter().map(|b| b.kind).collect()
    }

    #[test]
    fn test_empty_session_has_no_bubbles() {
        let session = ChatSession::new(ScriptedGateway::new(vec![]));
        assert!(transcript(&session).is_empty());
    }

    #[tokio::test]
    async fn test_transcript_follows_store_order_and_is_stable() {
        let mut session = ChatSession::new(ScriptedGateway::new(vec![Ok("A"), Ok("B")]));
        session.submit("q1").await;
        session.submit("q2").await;

        let first = transcript(&session);
        let texts: Vec<&str> = first.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["q1", "A", "q2", "B"]);
        assert_eq!(
            kinds(&first),
            vec![BubbleKind::User, BubbleKind::Model, BubbleKind::User, BubbleKind::Model]
        );

        assert_eq!(transcript(&session), first);
    }

    #[tokio::test]
    async fn test_error_bubble_attached_to_failed_turn_only() {
        let mut session = ChatSession::new(ScriptedGateway::new(vec![
            Ok("fine"),
            Err("network down"),
            Ok("back"),
        ]));
        session.submit("a").await;
        session.submit("b").await;
        session.submit("c").await;

        let bubbles = transcript(&session);
        assert_eq!(
            kinds(&bubbles),
            vec![
                BubbleKind::User,
                BubbleKind::Model,
                BubbleKind::User,
                BubbleKind::Error,
                BubbleKind::User,
                BubbleKind::Model,
            ]
        );
        assert_eq!(bubbles[2].text, "b");
        assert_eq!(bubbles[3].text, "Lỗi: network down");
    }

    #[test]
    fn test_pending_indicator_while_waiting() {
        let mut session = ChatSession::new(ScriptedGateway::new(vec![]));
        session.begin("hello").unwrap();

        let bubbles = transcript(&session);
        assert_eq!(kinds(&bubbles), vec![BubbleKind::User, BubbleKind::Pending]);

        session.complete(Ok("hi".to_string()));
        assert_eq!(
            kinds(&transcript(&session)),
            vec![BubbleKind::User, BubbleKind::Model]
        );
    }
}
