pub mod index_transcript_use_case;
pub mod index_video_use_case;
pub mod pipeline_logger;
pub mod search_spans_use_case;
