use rumqttc::{AsyncClient, ClientError, QoS};

/// The slice of `AsyncClient` the bridge needs.
pub trait MqttPublisher: Clone + Send + Sync + 'static {
    fn publish<S, V>(
        &self,
        topic: S,
        qos: QoS,
        retain: bool,
        payload: V,
    ) -> impl std::future::Future<Output = Result<(), ClientError>> + Send
    where
        S: Into<String> + Send,
        V: Into<Vec<u8>> + Send;

    fn subscribe<S: Into<String> + Send>(
        &self,
        topic: S,
        qos: QoS,
    ) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;

    fn disconnect(&self) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;
}

impl MqttPublisher for AsyncClient {
    async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<(), ClientError>
    where
        S: Into<String> + Send,
        V: Into<Vec<u8>> + Send,
    {
        AsyncClient::publish(self, topic, qos, retain, payload).await
    }

    async fn subscribe<S: Into<String> + Send>(&self, topic: S, qos: QoS) -> Result<(), ClientError> {
        AsyncClient::subscribe(self, topic, qos).await
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        AsyncClient::disconnect(self).await
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use rumqttc::{Request, Subscribe};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Published {
        pub topic: String,
        pub retain: bool,
        pub payload: String,
    }

    /// In-memory publisher that records everything it is asked to send.
    #[derive(Clone, Default)]
    pub struct RecordingMqttClient {
        published: Arc<Mutex<Vec<Published>>>,
        subscriptions: Arc<Mutex<Vec<String>>>,
        disconnected: Arc<AtomicBool>,
        reject_subscriptions: Arc<AtomicBool>,
    }

    impl RecordingMqttClient {
        pub fn published(&self) -> Vec<Published> {
            self.published.lock().unwrap().clone()
        }

        pub fn published_to(&self, topic: &str) -> Vec<Published> {
            self.published()
                .into_iter()
                .filter(|p| p.topic == topic)
                .collect()
        }

        pub fn subscriptions(&self) -> Vec<String> {
            self.subscriptions.lock().unwrap().clone()
        }

        pub fn is_disconnected(&self) -> bool {
            self.disconnected.load(Ordering::SeqCst)
        }

        /// Makes every later `subscribe` fail until switched back.
        pub fn reject_subscriptions(&self, reject: bool) {
            self.reject_subscriptions.store(reject, Ordering::SeqCst);
        }

        pub fn clear(&self) {
            self.published.lock().unwrap().clear();
            self.subscriptions.lock().unwrap().clear();
        }
    }

    impl MqttPublisher for RecordingMqttClient {
        async fn publish<S, V>(&self, topic: S, _qos: QoS, retain: bool, payload: V) -> Result<(), ClientError>
        where
            S: Into<String> + Send,
            V: Into<Vec<u8>> + Send,
        {
            let payload = String::from_utf8_lossy(&payload.into()).to_string();
            self.published.lock().unwrap().push(Published {
                topic: topic.into(),
                retain,
                payload,
            });
            Ok(())
        }

        async fn subscribe<S: Into<String> + Send>(&self, topic: S, qos: QoS) -> Result<(), ClientError> {
            if self.reject_subscriptions.load(Ordering::SeqCst) {
                return Err(ClientError::Request(Request::Subscribe(Subscribe::new(topic, qos))));
            }
            self.subscriptions.lock().unwrap().push(topic.into());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), ClientError> {
            self.disconnected.store(true, Ordering::SeqCst);
            Ok(())
        }
    }
}
