// Shared memory backend tests for Linux
// Run with: cargo test --test shared_memory -- --nocapture

#[cfg(target_os = "linux")]
mod linux_tests {
    use dmxp_qbench::Core::{
        attach_shared_memory, create_shared_memory, unlink_shared_memory, RawHandle,
    };
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_create_shared_memory() {
        let size = 4096;
        let shm = create_shared_memory(size, "qbench_shm_create").unwrap();

        assert_eq!(shm.size(), size);
        assert!(!shm.as_ptr().is_null());

        unsafe {
            let slice = std::slice::from_raw_parts_mut(shm.as_ptr(), size);
            slice[0] = 0x42;
            assert_eq!(slice[0], 0x42);
        }
        unlink_shared_memory("qbench_shm_create").unwrap();
    }

    #[test]
    #[serial]
    fn test_zero_size_rejected() {
        let err = create_shared_memory(0, "qbench_shm_zero").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    #[serial]
    fn test_raw_handle() {
        let shm = create_shared_memory(4096, "qbench_shm_handle").unwrap();
        match shm.raw_handle() {
            RawHandle::Fd(fd) => assert!(fd > 0, "File descriptor should be positive"),
        }
        unlink_shared_memory("qbench_shm_handle").unwrap();
    }

    #[test]
    #[serial]
    fn test_attach_sees_creator_writes() {
        let size = 8192;
        let creator = create_shared_memory(size, "/qbench_shm_attach").unwrap();
        let attached = attach_shared_memory("qbench_shm_attach", size).unwrap();
        assert_eq!(attached.size(), size);

        unsafe {
            let w = std::slice::from_raw_parts_mut(creator.as_ptr(), size);
            for (i, b) in w.iter_mut().enumerate().take(100) {
                *b = (i % 256) as u8;
            }
            let r = std::slice::from_raw_parts(attached.as_ptr(), size);
            for (i, b) in r.iter().enumerate().take(100) {
                assert_eq!(*b, (i % 256) as u8);
            }
        }
        unlink_shared_memory("qbench_shm_attach").unwrap();
    }

    #[test]
    #[serial]
    fn test_attach_rejects_small_or_missing_regions() {
        let _shm = create_shared_memory(1024, "qbench_shm_small").unwrap();
        let err = attach_shared_memory("qbench_shm_small", 4096).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        unlink_shared_memory("qbench_shm_small").unwrap();

        let err = attach_shared_memory("qbench_shm_small", 1).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    #[serial]
    fn test_mmap_zero_initialized() {
        let size = 1024;
        let shm = create_shared_memory(size, "qbench_shm_zero_init").unwrap();
        unsafe {
            let slice = std::slice::from_raw_parts(shm.as_ptr(), size);
            assert!(slice.iter().all(|&b| b == 0), "Mmap'd memory should be zero-initialized");
        }
        unlink_shared_memory("qbench_shm_zero_init").unwrap();
    }

    #[test]
    fn test_unlink_missing_is_ok() {
        assert!(unlink_shared_memory("qbench_shm_never_created").is_ok());
    }
}

#[cfg(not(target_os = "linux"))]
mod non_linux_tests {
    use dmxp_qbench::Core::{attach_shared_memory, create_shared_memory};

    #[test]
    fn test_unsupported_platform() {
        let err = create_shared_memory(4096, "qbench").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);

        let err = attach_shared_memory("qbench", 4096).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
    }
}
