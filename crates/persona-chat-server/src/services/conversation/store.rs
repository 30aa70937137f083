use crate::models::chat::{Role, Turn};

/// Append-only turn log of one session.
///
/// The first turn is always the hidden system turn; it survives `reset` and
/// is never part of the rendered view.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::new(Role::System, system_instruction)],
        }
    }

    /// Alternation is not checked; the request flow guarantees it.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn::new(role, content));
    }

    pub fn reset(&mut self) {
        self.turns.truncate(1);
    }

    pub fn render_view(&self) -> Vec<Turn> {
        self.prior_turns().to_vec()
    }

    /// Every turn after the system turn.
    pub fn prior_turns(&self) -> &[Turn] {
        &self.turns[1..]
    }

    pub fn system_instruction(&self) -> &str {
        &self.turns[0].content
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prior_turns().is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_log_holds_only_system_turn() {
        let log = ConversationLog::new("be helpful");
        assert_eq!(log.len(), 1);
        assert!(log.is_empty());
        assert_eq!(log.turns()[0].role, Role::System);
        assert_eq!(log.system_instruction(), "be helpful");
    }

    #[test]
    fn test_render_view_hides_system_turn() {
        let mut log = ConversationLog::new("secret instruction");
        log.append(Role::User, "hi");
        log.append(Role::Assistant, "hello");

        let view = log.render_view();
        assert_eq!(view.len(), 2);
        assert!(view.iter().all(|t| t.role != Role::System));
        assert!(view.iter().all(|t| t.content != "secret instruction"));
        assert_eq!(view[0], Turn::new(Role::User, "hi"));
        assert_eq!(view[1], Turn::new(Role::Assistant, "hello"));
    }

    #[test]
    fn test_reset_always_leaves_system_turn() {
        for n in [0usize, 1, 2, 7] {
            let mut log = ConversationLog::new("sys");
            for i in 0..n {
                log.append(Role::User, format!("q{}", i));
                log.append(Role::Assistant, format!("a{}", i));
            }
            log.reset();
            assert_eq!(log.len(), 1);
            assert_eq!(log.system_instruction(), "sys");
        }
    }

    #[test]
    fn test_append_does_not_enforce_alternation() {
        let mut log = ConversationLog::new("sys");
        log.append(Role::User, "one");
        log.append(Role::User, "two");
        assert_eq!(log.len(), 3);
    }
}
