pub mod audio_playback_manager;
