/// Exchange, queue and binding a consumer asserts before it subscribes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Durable topic exchange producers publish to.
    pub exchange: String,
    /// Durable queue this consumer reads from.
    pub queue: String,
    /// Routing pattern binding the queue to the exchange, e.g. `notification.#`.
    pub binding_key: String,
    /// Maximum number of unacknowledged deliveries handed to the consumer.
    pub prefetch: u16,
    pub consumer_tag: String,
}

/// A single message handed to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivery_tag: u64,
    /// Set by the broker when this message has been delivered before.
    pub redelivered: bool,
    pub routing_key: String,
    pub payload: Vec<u8>,
}

/// AMQP topic matching: `*` stands for exactly one word, `#` for zero or more.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&head, tail)) => (word == "*" || word == head) && match_words(rest, tail),
            None => false,
        },
    }
}
