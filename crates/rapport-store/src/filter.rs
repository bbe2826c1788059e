use rapport_columnar::{Predicate, col};
use rapport_types::Direction;

use crate::schema::InteractionColumn;

/// Rows where `user_id` is the actor (`Sent`) or the target (`Received`).
pub fn build_direction_filter(user_id: &str, direction: Direction) -> Predicate {
    let column = match direction {
        Direction::Sent => InteractionColumn::ActorId,
        Direction::Received => InteractionColumn::TargetId,
    };
    col(column.name()).eq(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapport_columnar::Value;

    #[test]
    fn sent_filters_on_actor_and_received_on_target() {
        assert_eq!(
            build_direction_filter("u1", Direction::Sent),
            Predicate::Eq {
                column: "actorId".into(),
                value: Value::from("u1"),
            }
        );
        assert_eq!(
            build_direction_filter("u1", Direction::Received),
            Predicate::Eq {
                column: "targetId".into(),
                value: Value::from("u1"),
            }
        );
    }
}
