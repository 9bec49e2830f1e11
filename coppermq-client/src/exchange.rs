use coppermq_codec::frame::{self, FieldTable, MethodFrameArgs};

use crate::callback::{Callbacks, Entity, Event};

/// The routing behavior of an exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeType {
    Direct,
    Fanout,
    Topic,
    Headers,
    /// A type the server knows through a plugin.
    Custom(String),
}

impl ExchangeType {
    pub fn as_str(&self) -> &str {
        match self {
            ExchangeType::Direct => "direct",
            ExchangeType::Fanout => "fanout",
            ExchangeType::Topic => "topic",
            ExchangeType::Headers => "headers",
            ExchangeType::Custom(name) => name,
        }
    }
}

impl From<&str> for ExchangeType {
    fn from(value: &str) -> Self {
        match value {
            "direct" => ExchangeType::Direct,
            "fanout" => ExchangeType::Fanout,
            "topic" => ExchangeType::Topic,
            "headers" => ExchangeType::Headers,
            custom => ExchangeType::Custom(custom.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeStatus {
    New,
    Declared,
    Deleted,
}

/// An exchange as this channel sees it. The empty name is the default
/// exchange which exists without declaring it.
#[derive(Debug)]
pub struct Exchange {
    pub name: String,
    pub exchange_type: ExchangeType,
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
    pub arguments: Option<FieldTable>,
    status: ExchangeStatus,
    pub(crate) callbacks: Callbacks<Exchange>,
}

impl Entity for Exchange {
    fn callbacks_mut(&mut self) -> &mut Callbacks<Self> {
        &mut self.callbacks
    }
}

impl Exchange {
    pub fn new(name: &str, exchange_type: ExchangeType) -> Self {
        Self {
            name: name.to_string(),
            exchange_type,
            durable: false,
            auto_delete: false,
            internal: false,
            arguments: None,
            status: ExchangeStatus::New,
            callbacks: Callbacks::default(),
        }
    }

    /// The unnamed default exchange.
    pub fn default_exchange() -> Self {
        Exchange::new("", ExchangeType::Direct)
    }

    pub fn durable(mut self, mode: bool) -> Self {
        self.durable = mode;
        self
    }

    pub fn auto_delete(mut self, mode: bool) -> Self {
        self.auto_delete = mode;
        self
    }

    pub fn internal(mut self, mode: bool) -> Self {
        self.internal = mode;
        self
    }

    pub fn arguments(mut self, arguments: FieldTable) -> Self {
        self.arguments = Some(arguments);
        self
    }

    pub fn status(&self) -> ExchangeStatus {
        self.status
    }

    pub(crate) fn declare_args(&self) -> frame::ExchangeDeclareArgs {
        let mut args = frame::ExchangeDeclareArgs::default()
            .exchange_name(&self.name)
            .exchange_type(self.exchange_type.as_str())
            .durable(self.durable)
            .auto_delete(self.auto_delete)
            .internal(self.internal);
        args.args = self.arguments.clone();

        args
    }

    pub(crate) fn handle_declare_ok(&mut self) {
        self.status = ExchangeStatus::Declared;
        self.fire(Event::Declare, &MethodFrameArgs::ExchangeDeclareOk);
    }

    pub(crate) fn handle_delete_ok(&mut self) {
        self.status = ExchangeStatus::Deleted;
        self.fire(Event::Delete, &MethodFrameArgs::ExchangeDeleteOk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_type_maps_to_wire_names() {
        assert_eq!("topic", ExchangeType::Topic.as_str());
        assert_eq!(ExchangeType::Fanout, ExchangeType::from("fanout"));
        assert_eq!(
            ExchangeType::Custom("x-delayed".to_string()),
            ExchangeType::from("x-delayed")
        );
    }

    #[test]
    fn declare_ok_marks_the_exchange_declared() {
        let mut exchange = Exchange::new("logs", ExchangeType::Topic).durable(true);

        assert_eq!(ExchangeStatus::New, exchange.status());

        exchange.handle_declare_ok();

        assert_eq!(ExchangeStatus::Declared, exchange.status());
    }
}
