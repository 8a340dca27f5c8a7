//! Background threads behind the two asynchronous service boundaries.
//!
//! Each service runs on its own thread with a request channel and a result
//! channel. The UI loop never blocks on them: it sends a request and picks up
//! the answer with `try_recv` on a later turn. When requests pile up only the
//! newest one is processed, since older ones are stale by construction.

use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::assets::AssetLookup;
use crate::error::ServiceError;
use crate::markdown::Converter;
use crate::pipeline::{ConvertRequest, ConvertResponse, ResolveRequest, ResolveResponse};

pub const CONVERSION: &str = "conversion";
pub const RESOLUTION: &str = "asset resolution";

/// Handle to one background worker thread.
pub struct Worker<Req, Resp> {
    name: &'static str,
    request_sender: Sender<Req>,
    result_receiver: Receiver<Resp>,
    #[allow(dead_code)]
    thread_handle: JoinHandle<()>,
}

impl<Req: Send + 'static, Resp: Send + 'static> Worker<Req, Resp> {
    pub fn spawn<F>(name: &'static str, mut handler: F) -> io::Result<Self>
    where
        F: FnMut(Req) -> Resp + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<Req>();
        let (result_tx, result_rx) = mpsc::channel::<Resp>();

        let thread_handle = thread::Builder::new()
            .name(format!("{}-worker", name.replace(' ', "-")))
            .spawn(move || {
                while let Ok(request) = request_rx.recv() {
                    let mut latest = request;
                    while let Ok(newer) = request_rx.try_recv() {
                        latest = newer;
                    }
                    if result_tx.send(handler(latest)).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            name,
            request_sender: request_tx,
            result_receiver: result_rx,
            thread_handle,
        })
    }

    pub fn request(&self, request: Req) -> Result<(), ServiceError> {
        self.request_sender
            .send(request)
            .map_err(|_| ServiceError::Disconnected { service: self.name })
    }

    pub fn try_recv(&self) -> Option<Resp> {
        match self.result_receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Run `f`, turning a panic into a service error.
pub fn guarded<T>(service: &'static str, f: impl FnOnce() -> T) -> Result<T, ServiceError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        ServiceError::Panicked { service, message }
    })
}

#[derive(Debug)]
pub enum ServiceReply {
    Converted(ConvertResponse),
    Resolved(ResolveResponse),
}

/// Where the content pipeline sends its work.
pub trait ServiceHost {
    fn convert(&mut self, request: ConvertRequest);
    fn resolve(&mut self, request: ResolveRequest);
    fn poll(&mut self) -> Option<ServiceReply>;
}

pub struct ThreadedServices {
    conversion: Worker<ConvertRequest, ConvertResponse>,
    resolution: Worker<ResolveRequest, ResolveResponse>,
    /// Failures detected on send, delivered through `poll` like any reply
    local: VecDeque<ServiceReply>,
}

impl ThreadedServices {
    pub fn spawn(converter: impl Converter, mut lookup: impl AssetLookup) -> io::Result<Self> {
        let conversion = Worker::spawn(CONVERSION, move |request: ConvertRequest| {
            let result = guarded(CONVERSION, || converter.convert(&request.text)).and_then(|r| r);
            ConvertResponse {
                generation: request.generation,
                result,
            }
        })?;
        let resolution = Worker::spawn(RESOLUTION, move |request: ResolveRequest| {
            let result = guarded(RESOLUTION, || {
                lookup.resolve(&request.document_path, &request.tokens)
            });
            ResolveResponse {
                generation: request.generation,
                result,
            }
        })?;
        Ok(Self {
            conversion,
            resolution,
            local: VecDeque::new(),
        })
    }
}

impl ServiceHost for ThreadedServices {
    fn convert(&mut self, request: ConvertRequest) {
        let generation = request.generation;
        if let Err(e) = self.conversion.request(request) {
            self.local.push_back(ServiceReply::Converted(ConvertResponse {
                generation,
                result: Err(e),
            }));
        }
    }

    fn resolve(&mut self, request: ResolveRequest) {
        let generation = request.generation;
        if let Err(e) = self.resolution.request(request) {
            self.local.push_back(ServiceReply::Resolved(ResolveResponse {
                generation,
                result: Err(e),
            }));
        }
    }

    fn poll(&mut self) -> Option<ServiceReply> {
        if let Some(reply) = self.local.pop_front() {
            return Some(reply);
        }
        if let Some(converted) = self.conversion.try_recv() {
            return Some(ServiceReply::Converted(converted));
        }
        self.resolution.try_recv().map(ServiceReply::Resolved)
    }
}

/// Synchronous host for tests: requests are answered in order on `poll`,
/// and every call is recorded.
#[cfg(test)]
pub struct InlineServices<C, L> {
    pub converter: C,
    pub lookup: L,
    pub convert_calls: Vec<String>,
    pub resolve_calls: Vec<Vec<String>>,
    queue: VecDeque<ServiceReply>,
}

#[cfg(test)]
impl<C: Converter, L: AssetLookup> InlineServices<C, L> {
    pub fn new(converter: C, lookup: L) -> Self {
        Self {
            converter,
            lookup,
            convert_calls: Vec::new(),
            resolve_calls: Vec::new(),
            queue: VecDeque::new(),
        }
    }
}

#[cfg(test)]
impl<C: Converter, L: AssetLookup> ServiceHost for InlineServices<C, L> {
    fn convert(&mut self, request: ConvertRequest) {
        self.convert_calls.push(request.text.clone());
        let result = guarded(CONVERSION, || self.converter.convert(&request.text)).and_then(|r| r);
        self.queue.push_back(ServiceReply::Converted(ConvertResponse {
            generation: request.generation,
            result,
        }));
    }

    fn resolve(&mut self, request: ResolveRequest) {
        self.resolve_calls.push(request.tokens.clone());
        let lookup = &mut self.lookup;
        let result = guarded(RESOLUTION, || lookup.resolve(&request.document_path, &request.tokens));
        self.queue.push_back(ServiceReply::Resolved(ResolveResponse {
            generation: request.generation,
            result,
        }));
    }

    fn poll(&mut self) -> Option<ServiceReply> {
        self.queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::{Duration, Instant};

    use crate::markdown::MarkdownConverter;

    struct NoAssets;

    impl AssetLookup for NoAssets {
        fn resolve(&mut self, _: &Path, tokens: &[String]) -> HashMap<String, Option<String>> {
            tokens.iter().map(|t| (t.clone(), None)).collect()
        }
    }

    struct Exploding;

    impl AssetLookup for Exploding {
        fn resolve(&mut self, _: &Path, _: &[String]) -> HashMap<String, Option<String>> {
            panic!("index corrupted")
        }
    }

    fn wait_for(services: &mut ThreadedServices) -> ServiceReply {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(reply) = services.poll() {
                return reply;
            }
            assert!(Instant::now() < deadline, "worker did not answer");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_guarded_captures_panic_message() {
        let result: Result<(), _> = guarded(CONVERSION, || panic!("boom"));
        assert_eq!(
            result,
            Err(ServiceError::Panicked {
                service: CONVERSION,
                message: "boom".into()
            })
        );
        assert_eq!(guarded(CONVERSION, || 7), Ok(7));
    }

    #[test]
    fn test_threaded_conversion_round_trip() {
        let mut services = ThreadedServices::spawn(MarkdownConverter, NoAssets).unwrap();
        services.convert(ConvertRequest {
            generation: 3,
            text: "# Hi".into(),
        });
        match wait_for(&mut services) {
            ServiceReply::Converted(response) => {
                assert_eq!(response.generation, 3);
                assert_eq!(response.result.unwrap().headings().len(), 1);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_resolver_panic_becomes_error() {
        let mut services = ThreadedServices::spawn(MarkdownConverter, Exploding).unwrap();
        services.resolve(ResolveRequest {
            generation: 1,
            document_path: "/doc.md".into(),
            tokens: vec!["a.png".into()],
        });
        match wait_for(&mut services) {
            ServiceReply::Resolved(response) => {
                assert!(matches!(response.result, Err(ServiceError::Panicked { .. })));
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }
}
