use std::sync::Arc;
use futures::StreamExt;
use tokio::sync::mpsc;
use log::{debug, error, info};
use crate::BackendFoot;
use crate::providers::{
    ChatCompletionClient, ChatTransport, FrameStream, OpenAiChatCompletion,
    TextCompletionClient,
};

/// Public API for the completion backend - owns the task
pub struct CompletionBackend
{   hand: crate::BackendHand
  , _task_handle: tokio::task::JoinHandle<()>
}

impl CompletionBackend
{   /// Spawn a backend task owning `service`
    /// Returns immediately
    pub fn new<T>(service: OpenAiChatCompletion<T>) -> Self
    where
      T: ChatTransport + 'static
    {   debug!("Creating CompletionBackend with task ownership");

        let (complete_chat_tx, complete_chat_rx)
          = mpsc::unbounded_channel();
        let (complete_text_tx, complete_text_rx)
          = mpsc::unbounded_channel();
        let (stream_chat_tx, stream_chat_rx)
          = mpsc::unbounded_channel();
        let (stream_text_tx, stream_text_rx)
          = mpsc::unbounded_channel();
        let (kill_process_tx, kill_process_rx)
          = mpsc::unbounded_channel();

        let hand = crate::BackendHand
        {   complete_chat_tx
          , complete_text_tx
          , stream_chat_tx
          , stream_text_tx
          , kill_process_tx
        };

        let foot = crate::BackendFoot
        {   complete_chat_rx
          , complete_text_rx
          , stream_chat_rx
          , stream_text_rx
          , kill_process_rx
        };

        let service = Arc::new(service);
        let _task_handle = tokio::spawn(async move {
          run_backend_loop(foot, service).await
        });

        CompletionBackend
        {   hand
          , _task_handle
        }
    }

    /// Complete a chat - returns almost immediately
    pub async fn complete_chat(
      &self
    , messages: Vec<crate::Message>
    , settings: crate::ChatRequestSettings
    ) -> Result<
        mpsc::UnboundedReceiver<crate::CompleteReply>,
        crate::error::Error
      >
    {   debug!("complete_chat queuing {} messages", messages.len());
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::CompleteChatArgs
        {   messages
          , settings
          , reply: reply_tx
        };

        self.hand.complete_chat_tx
          .send(cmd)
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Complete a prompt - returns almost immediately
    pub async fn complete_text(
      &self
    , prompt: String
    , settings: crate::TextRequestSettings
    ) -> Result<
        mpsc::UnboundedReceiver<crate::CompleteReply>,
        crate::error::Error
      >
    {   debug!("complete_text queuing command");
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::CompleteTextArgs
        {   prompt
          , settings
          , reply: reply_tx
        };

        self.hand.complete_text_tx
          .send(cmd)
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Stream a chat completion
    ///
    /// Dropping the receiver stops the stream and releases the connection.
    pub async fn complete_chat_stream(
      &self
    , messages: Vec<crate::Message>
    , settings: crate::ChatRequestSettings
    ) -> Result<
        mpsc::Receiver<crate::StreamReply>,
        crate::error::Error
      >
    {   debug!("complete_chat_stream queuing {} messages", messages.len());
        let (reply_tx, reply_rx) = mpsc::channel(1);

        let cmd = crate::StreamChatArgs
        {   messages
          , settings
          , reply: reply_tx
        };

        self.hand.stream_chat_tx
          .send(cmd)
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Stream a text completion
    pub async fn complete_text_stream(
      &self
    , prompt: String
    , settings: crate::TextRequestSettings
    ) -> Result<
        mpsc::Receiver<crate::StreamReply>,
        crate::error::Error
      >
    {   debug!("complete_text_stream queuing command");
        let (reply_tx, reply_rx) = mpsc::channel(1);

        let cmd = crate::StreamTextArgs
        {   prompt
          , settings
          , reply: reply_tx
        };

        self.hand.stream_text_tx
          .send(cmd)
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Gracefully shutdown the backend
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down CompletionBackend");
        let (reply_tx, mut reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::KillProcessArgs
        {   reply: reply_tx
        };

        self.hand.kill_process_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel already closed");
            crate::error::Error::Other(
              "Backend already shutdown".to_string()
            )
          })?;

        if let Some(result) = reply_rx.recv().await
        {   debug!("Backend shutdown confirmed");
            result
        } else
        {   error!("Backend stopped before confirming shutdown");
            Err(crate::error::Error::Other(
              "Backend disconnected".to_string()
            ))
        }
    }
}

fn disconnected() -> crate::error::Error
{   error!("Backend channel closed");
    crate::error::Error::Other(
      "Backend disconnected".to_string()
    )
}

/// Pump frames into `reply` until the stream ends or the receiver goes away
async fn forward_frames(
  frames: Result<FrameStream, crate::error::Error>
, reply: crate::StreamReplySender
)
{   let mut frames = match frames
    {   Ok(frames) => frames
      , Err(e) => {
          let _ = reply.send(Err(e)).await;
          return;
        }
    };

    // A stalled provider must not pin the connection once the caller is gone
    loop
    { tokio::select!
      { _ = reply.closed() => {
          debug!("Stream receiver dropped, closing stream");
          return;
        }
      , frame = frames.next() => match frame
        {   Some(frame) => {
              if reply.send(frame).await.is_err()
              {   debug!("Stream receiver dropped, closing stream");
                  return;
              }
            }
          , None => break
        }
      }
    }
    debug!("Stream finished");
}

/// Main backend event loop
///
/// select! only routes: every command runs on its own task so a slow
/// completion never holds up the others.
async fn run_backend_loop<T>(
  foot: crate::BackendFoot
, service: Arc<OpenAiChatCompletion<T>>
)
where
  T: ChatTransport + 'static
{   debug!("Starting CompletionBackend event loop");
    let BackendFoot
    {   mut complete_chat_rx
      , mut complete_text_rx
      , mut stream_chat_rx
      , mut stream_text_rx
      , mut kill_process_rx
    } = foot;

    loop
    { tokio::select!
      { Some(cmd) = complete_chat_rx.recv() => {
          debug!("Received CompleteChat");
          let service = service.clone();
          tokio::spawn(async move {
            let result = service
              .complete_chat(&cmd.messages, &cmd.settings)
              .await;
            let _ = cmd.reply.send(result);
          });
        }
      , Some(cmd) = complete_text_rx.recv() => {
          debug!("Received CompleteText");
          let service = service.clone();
          tokio::spawn(async move {
            let result = service
              .complete_text(&cmd.prompt, &cmd.settings)
              .await;
            let _ = cmd.reply.send(result);
          });
        }
      , Some(cmd) = stream_chat_rx.recv() => {
          debug!("Received StreamChat");
          let service = service.clone();
          tokio::spawn(async move {
            let frames = service
              .complete_chat_stream(&cmd.messages, &cmd.settings)
              .await;
            forward_frames(frames, cmd.reply).await;
          });
        }
      , Some(cmd) = stream_text_rx.recv() => {
          debug!("Received StreamText");
          let service = service.clone();
          tokio::spawn(async move {
            let frames = service
              .complete_text_stream(&cmd.prompt, &cmd.settings)
              .await;
            forward_frames(frames, cmd.reply).await;
          });
        }
      , Some(cmd) = kill_process_rx.recv() => {
          debug!("Received KillProcess");
          let _ = cmd.reply.send(Ok(()));
          info!("CompletionBackend shutting down");
          break;
        }
      , else => {
          debug!("Command channels closed");
          break;
        }
      }
    }
}
