use std::{cell::RefCell, collections::VecDeque};

use assert_call::call;
use futures::{
    channel::oneshot,
    future::LocalBoxFuture,
    FutureExt,
};
use serde::{Deserialize, Serialize};

use crate::{Entity, Gateway, GatewayError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Entity)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: u32,
}

pub fn product(id: &str, name: &str, price: u32) -> Product {
    Product {
        id: id.into(),
        name: name.into(),
        price,
    }
}

pub fn draft(name: &str, price: u32) -> ProductDraft {
    ProductDraft {
        name: name.into(),
        price,
    }
}

pub enum Reply {
    Ok(Option<Product>),
    Err(GatewayError),
}

/// A gateway whose calls stay pending until the test answers them with [`reply`](Self::reply).
///
/// Each call is recorded with `call!`.
#[derive(Default)]
pub struct ScriptedGateway {
    pending: RefCell<VecDeque<oneshot::Sender<Reply>>>,
}

impl ScriptedGateway {
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Answers the oldest pending call.
    pub fn reply(&self, reply: Reply) {
        let tx = self
            .pending
            .borrow_mut()
            .pop_front()
            .expect("no pending call");
        let _ = tx.send(reply);
    }
    pub fn ok(&self, entity: Product) {
        self.reply(Reply::Ok(Some(entity)));
    }
    pub fn ok_empty(&self) {
        self.reply(Reply::Ok(None));
    }
    pub fn fail(&self, status: u16, status_text: &str) {
        self.reply(Reply::Err(GatewayError::new(status, status_text)));
    }

    fn wait(&self) -> LocalBoxFuture<'static, Result<Option<Product>, GatewayError>> {
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push_back(tx);
        async move {
            match rx.await {
                Ok(Reply::Ok(entity)) => Ok(entity),
                Ok(Reply::Err(e)) => Err(e),
                Err(_) => Err(GatewayError::transport("canceled")),
            }
        }
        .boxed_local()
    }
}

impl Gateway<Product> for ScriptedGateway {
    fn list(&self) -> LocalBoxFuture<'_, Result<Vec<Product>, GatewayError>> {
        call!("list");
        let (tx, rx) = oneshot::channel::<Vec<Product>>();
        drop(tx);
        async move { rx.await.map_err(|_| GatewayError::transport("canceled")) }.boxed_local()
    }
    fn create<'a>(
        &'a self,
        draft: &'a ProductDraft,
    ) -> LocalBoxFuture<'a, Result<Product, GatewayError>> {
        call!("create {}", draft.name);
        let f = self.wait();
        async move {
            f.await?
                .ok_or_else(|| GatewayError::new(500, "Empty Response"))
        }
        .boxed_local()
    }
    fn update<'a>(&'a self, entity: &'a Product) -> LocalBoxFuture<'a, Result<Product, GatewayError>> {
        call!("update {} {}", entity.id, entity.price);
        let f = self.wait();
        let entity = entity.clone();
        async move { Ok(f.await?.unwrap_or(entity)) }.boxed_local()
    }
    fn delete<'a>(&'a self, id: &'a str) -> LocalBoxFuture<'a, Result<(), GatewayError>> {
        call!("delete {id}");
        let f = self.wait();
        async move { f.await.map(|_| ()) }.boxed_local()
    }
}
