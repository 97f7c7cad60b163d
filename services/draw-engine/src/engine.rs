use std::sync::Arc;

use cosmwasm_std::{
    from_json, Addr, Binary, Event, MemoryStorage, Response, StdError, StdResult, Storage,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use survey_draw_common::types::DrawTrigger;
use tracing::{debug, info, warn};

use crate::contract;
use crate::error::ContractError;
use crate::msg::{CallInfo, DrawResponse, ExecuteMsg, InstantiateMsg, MigrateMsg, QueryMsg};
use crate::sources::{Clock, OsSeedSource, SeedSource, SystemClock};

/// Delivers win notifications. The engine only knows the winning token;
/// mapping it to a contact belongs to the implementor.
pub trait WinnerNotifier: Send + Sync {
    fn notify(&self, instance_id: &str, winner_token: &str) -> Result<(), String>;
}

impl<T: WinnerNotifier + ?Sized> WinnerNotifier for Arc<T> {
    fn notify(&self, instance_id: &str, winner_token: &str) -> Result<(), String> {
        (**self).notify(instance_id, winner_token)
    }
}

/// Native host for the draw engine.
///
/// Every execute holds the store lock for its whole duration, so no other
/// caller observes a message halfway through. The store has no rollback: a
/// failing message keeps whatever it wrote before the error, so handlers
/// write their commit step last. Concurrent triggers for one instance
/// resolve to one draw plus idempotent replays.
pub struct DrawEngine<S: Storage = MemoryStorage> {
    storage: Mutex<S>,
    seeds: Box<dyn SeedSource>,
    clock: Box<dyn Clock>,
    notifier: Option<Box<dyn WinnerNotifier>>,
}

impl DrawEngine<MemoryStorage> {
    /// In-memory store, OS randomness and the system clock.
    pub fn in_memory() -> Self {
        DrawEngine::new(MemoryStorage::new(), OsSeedSource, SystemClock)
    }
}

impl<S: Storage> DrawEngine<S> {
    pub fn new(
        storage: S,
        seeds: impl SeedSource + 'static,
        clock: impl Clock + 'static,
    ) -> Self {
        DrawEngine {
            storage: Mutex::new(storage),
            seeds: Box::new(seeds),
            clock: Box::new(clock),
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: impl WinnerNotifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    fn call_info(&self, sender: &str) -> CallInfo {
        CallInfo {
            sender: Addr::unchecked(sender),
            time: self.clock.now(),
        }
    }

    pub fn instantiate(
        &self,
        sender: &str,
        msg: InstantiateMsg,
    ) -> Result<Response, ContractError> {
        let call = self.call_info(sender);
        let mut storage = self.storage.lock();
        let res = contract::instantiate(&mut *storage, &call, msg)?;
        info!(admin = sender, "draw engine instantiated");
        Ok(res)
    }

    pub fn migrate(&self, msg: MigrateMsg) -> Result<Response, ContractError> {
        let mut storage = self.storage.lock();
        let res = contract::migrate(&mut *storage, msg)?;
        info!("draw engine store migrated");
        Ok(res)
    }

    /// Direct access to the store under the lock, for maintenance tooling.
    pub fn with_storage<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut storage = self.storage.lock();
        f(&mut *storage)
    }

    /// Run one execute message under the store lock.
    pub fn execute(&self, sender: &str, msg: ExecuteMsg) -> Result<Response, ContractError> {
        let call = self.call_info(sender);
        let res = {
            let mut storage = self.storage.lock();
            contract::execute(&mut *storage, &call, self.seeds.as_ref(), msg)
        };

        match &res {
            Ok(response) => self.observe(response),
            Err(err) => debug!(sender, error = %err, "execute rejected"),
        }
        res
    }

    pub fn query(&self, msg: QueryMsg) -> StdResult<Binary> {
        let now = self.clock.now();
        let storage = self.storage.lock();
        contract::query(&*storage, now, msg)
    }

    /// `query` with the response decoded.
    pub fn query_as<T: DeserializeOwned>(&self, msg: QueryMsg) -> StdResult<T> {
        from_json(self.query(msg)?)
    }

    /// Trigger the draw of an instance and decode the draw result.
    pub fn trigger_draw(
        &self,
        sender: &str,
        instance_id: &str,
        trigger: DrawTrigger,
    ) -> Result<DrawResponse, ContractError> {
        let res = self.execute(
            sender,
            ExecuteMsg::TriggerDraw {
                instance_id: instance_id.to_string(),
                trigger,
            },
        )?;
        draw_response(&res)
    }

    /// Close an instance, then fire its auto draw when the closure asks
    /// for one. Returns the draw result if a draw ran.
    ///
    /// A failed auto draw leaves the instance closed; the error is returned
    /// and the caller decides whether to retry.
    pub fn close_instance(
        &self,
        sender: &str,
        instance_id: &str,
    ) -> Result<Option<DrawResponse>, ContractError> {
        let res = self.execute(
            sender,
            ExecuteMsg::CloseInstance {
                instance_id: instance_id.to_string(),
            },
        )?;

        let auto_draw = res
            .attributes
            .iter()
            .any(|attr| attr.key == "auto_draw" && attr.value == "true");
        if !auto_draw {
            return Ok(None);
        }

        self.trigger_draw(sender, instance_id, DrawTrigger::Auto)
            .map(Some)
            .inspect_err(|err| warn!(instance_id, error = %err, "auto draw at closure failed"))
    }

    /// Logs and notifications for a committed response.
    fn observe(&self, response: &Response) {
        for event in &response.events {
            let attr = |key: &str| event_attr(event, key);

            match event.ty.as_str() {
                "survey_draw_completed" => info!(
                    instance_id = attr("instance_id"),
                    record_id = attr("record_id"),
                    candidates_count = attr("candidates_count"),
                    seed = attr("seed"),
                    "draw completed"
                ),
                "survey_draw_winner" => self.notify(attr("instance_id"), attr("winner_token")),
                "survey_draw_reset" => warn!(
                    instance_id = attr("instance_id"),
                    resolution = attr("resolution"),
                    "stuck draw reconciled"
                ),
                _ => {}
            }
        }

        let replayed = response
            .attributes
            .iter()
            .any(|a| a.key == "already_drawn" && a.value == "true");
        if replayed {
            debug!("draw already completed, returned stored record");
        }
    }

    fn notify(&self, instance_id: &str, winner_token: &str) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if let Err(reason) = notifier.notify(instance_id, winner_token) {
            warn!(instance_id, %reason, "winner notification failed");
        }
    }
}

fn event_attr<'a>(event: &'a Event, key: &str) -> &'a str {
    event
        .attributes
        .iter()
        .find(|a| a.key == key)
        .map(|a| a.value.as_str())
        .unwrap_or_default()
}

fn draw_response(res: &Response) -> Result<DrawResponse, ContractError> {
    let data = res
        .data
        .as_ref()
        .ok_or_else(|| StdError::generic_err("draw response carried no data"))?;
    Ok(from_json(data)?)
}
