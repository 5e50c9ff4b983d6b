use crate::prelude::*;
use crate::sensor::Sensor;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, Publish, QoS};
use std::time::Duration;

// Message {{{
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub retain: bool,
    pub payload: String,
}

impl Message {
    pub fn state_topic(serial: u64, key: FieldKey) -> String {
        format!("{}/{}/state", serial, key)
    }

    pub fn availability_topic(serial: u64, key: FieldKey) -> String {
        format!("{}/{}/availability", serial, key)
    }

    /// Everything to publish for one coordinator update.
    ///
    /// Per sensor, availability is always sent; the state only when the
    /// sensor has a value, so an unknown counter keeps its last published
    /// state rather than dropping to zero.
    pub fn for_update(serial: u64, sensors: &[Sensor], update: &Update) -> Result<Vec<Message>> {
        let mut r = Vec::new();

        for sensor in sensors {
            let available = sensor.available(update);

            r.push(Message {
                topic: Self::availability_topic(serial, sensor.key()),
                retain: true,
                payload: if available { "online" } else { "offline" }.to_owned(),
            });

            if !available {
                continue;
            }

            if let Some(value) = sensor.native_value(update) {
                r.push(Message {
                    topic: Self::state_topic(serial, sensor.key()),
                    retain: true,
                    payload: value.to_string(),
                });
            }
        }

        if let Some(snapshot) = &update.snapshot {
            r.push(Message {
                topic: format!("{}/snapshot", serial),
                retain: false,
                payload: Self::snapshot_payload(snapshot, update)?,
            });
        }

        Ok(r)
    }

    // the decoded snapshot, with lifetime counters shown the same way as
    // their sensors: left out while unknown, never below the last value
    fn snapshot_payload(snapshot: &Snapshot, update: &Update) -> Result<String> {
        let mut json = serde_json::to_value(snapshot)?;

        if let Some(map) = json.as_object_mut() {
            for key in FieldKey::PRESERVED {
                match update.counter(key) {
                    Some(value) => map.insert(key.to_string(), serde_json::json!(value)),
                    None => map.remove(key.as_str()),
                };
            }
        }

        Ok(serde_json::to_string(&json)?)
    }
} // }}}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ChannelData {
    Shutdown,
}

#[derive(Clone)]
pub struct Mqtt {
    config: Config,
    channels: Channels,
    sensors: Vec<Sensor>,
}

impl Mqtt {
    pub fn new(config: Config, channels: Channels) -> Self {
        let sensors = Sensor::for_inverter(&config.inverter);

        Self {
            config,
            channels,
            sensors,
        }
    }

    pub async fn start(&self) -> Result<()> {
        let c = &self.config.mqtt;

        if !c.enabled() {
            info!("mqtt disabled, skipping");
            return Ok(());
        }

        let mut options = MqttOptions::new(
            format!("trannergy-bridge-{}", self.config.inverter.serial()),
            c.host(),
            c.port(),
        );

        options.set_last_will(LastWill::new(
            self.lwt_topic(),
            "offline",
            QoS::AtLeastOnce,
            true,
        ));

        options.set_keep_alive(Duration::from_secs(60));
        if let (Some(u), Some(p)) = (c.username(), c.password()) {
            options.set_credentials(u, p);
        }

        info!("initializing mqtt at {}:{}", c.host(), c.port());

        let (client, eventloop) = AsyncClient::new(options, 10);

        futures::try_join!(
            self.setup(client.clone()),
            self.receiver(eventloop, client.clone()),
            self.sender(client)
        )?;

        Ok(())
    }

    pub fn stop(&self) {
        info!("Stopping MQTT client...");
        let _ = self.channels.to_mqtt.send(ChannelData::Shutdown);
    }

    async fn setup(&self, client: AsyncClient) -> Result<()> {
        client
            .publish(self.lwt_topic(), QoS::AtLeastOnce, true, "online")
            .await?;

        if self.config.mqtt.homeassistant().enabled() {
            client
                .subscribe(self.homeassistant_status_topic(), QoS::AtMostOnce)
                .await?;
            self.publish_discovery(&client).await;
        }

        Ok(())
    }

    async fn publish_discovery(&self, client: &AsyncClient) {
        let ha = crate::home_assistant::Config::new(&self.config.inverter, &self.config.mqtt);
        match ha.all() {
            Ok(messages) => {
                for msg in messages.into_iter() {
                    if let Err(e) = client
                        .publish(&msg.topic, QoS::AtLeastOnce, msg.retain, msg.payload)
                        .await
                    {
                        warn!("failed to publish discovery to {}: {}", msg.topic, e);
                    }
                }
            }
            Err(e) => error!("failed to build discovery config: {}", e),
        }
    }

    async fn receiver(&self, mut eventloop: EventLoop, client: AsyncClient) -> Result<()> {
        let mut shutdown = self.channels.to_mqtt.subscribe();

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                event = eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Incoming::Publish(publish))) => {
                            self.handle_message(publish, &client).await;
                        }
                        Err(e) => {
                            error!("{}", e);
                            info!("reconnecting in 5s");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                        _ => {} // keepalives etc
                    }
                }
            }
        }

        info!("MQTT receiver loop exiting");
        Ok(())
    }

    // Home Assistant announces itself on {prefix}/status after a restart;
    // it has forgotten our (non-persisted) entities, so send them again.
    async fn handle_message(&self, publish: Publish, client: &AsyncClient) {
        let payload = String::from_utf8_lossy(&publish.payload);
        debug!("RX: {} = {}", publish.topic, payload);

        if publish.topic == self.homeassistant_status_topic() && payload == "online" {
            info!("Home Assistant came online, republishing discovery");
            self.publish_discovery(client).await;
        }
    }

    // coordinator -> mqtt
    async fn sender(&self, client: AsyncClient) -> Result<()> {
        let mut receiver = self.channels.from_coordinator.subscribe();
        let mut shutdown = self.channels.to_mqtt.subscribe();
        let serial = self.config.inverter.serial();

        loop {
            let update = tokio::select! {
                _ = shutdown.recv() => break,
                msg = receiver.recv() => match msg {
                    Ok(coordinator::ChannelData::Update(update)) => update,
                    Ok(coordinator::ChannelData::Shutdown) | Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("MQTT sender lagged, {} updates dropped", n);
                        continue;
                    }
                },
            };

            for message in Message::for_update(serial, &self.sensors, &update)? {
                let topic = format!("{}/{}", self.config.mqtt.namespace(), message.topic);
                debug!("publishing: {} = {}", topic, message.payload);
                if let Err(err) = client
                    .publish(&topic, QoS::AtLeastOnce, message.retain, message.payload.into_bytes())
                    .await
                {
                    // the next update republishes everything anyway
                    error!("MQTT publish to {} failed: {:?}", topic, err);
                }
            }
        }

        info!("MQTT sender loop exiting");
        let _ = client.disconnect().await;
        Ok(())
    }

    fn lwt_topic(&self) -> String {
        format!("{}/LWT", self.config.mqtt.namespace())
    }

    fn homeassistant_status_topic(&self) -> String {
        format!("{}/status", self.config.mqtt.homeassistant().prefix())
    }
}
