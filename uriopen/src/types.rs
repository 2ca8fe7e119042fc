use bytes::{Bytes, BytesMut};
use futures::{StreamExt as _, TryStreamExt as _, future, stream};

/// Byte stream.
pub type ValueStream = futures::stream::BoxStream<'static, Result<Bytes, anyhow::Error>>;

/// Wrap a buffer as a single-chunk [`ValueStream`].
pub fn stream_from_bytes(data: impl Into<Bytes>) -> ValueStream {
    let data: Bytes = data.into();
    stream::once(future::ready(Ok(data))).boxed()
}

/// Read a whole stream into memory.
///
/// Fails with the first error yielded by the stream.
pub async fn read_to_bytes(stream: ValueStream) -> Result<Bytes, anyhow::Error> {
    let buf = stream
        .try_fold(BytesMut::new(), |mut buf, chunk| async move {
            buf.extend_from_slice(&chunk);
            Ok(buf)
        })
        .await?;
    Ok(buf.freeze())
}
